use crate::commands::{self, Command, HELP};
use crate::render::{self, BusyIndicator};
use anyhow::Context;
use application::conversation_store::ConversationStore;
use application::orchestrator::{ChatError, ChatOrchestrator, Difficulty, ExchangeOutcome, TripForm};
use clap::Parser;
use colored::Colorize;
use dialoguer::{theme::ColorfulTheme, Input, Select};
use domain::attachment::Attachment;
use domain::reply::AssistantReply;
use domain::storage::{KeyValueStore, MemoryStore};
use infrastructure::api_client::ApiClient;
use infrastructure::config::Config;
use infrastructure::export::ItineraryDocument;
use infrastructure::kv_store::SqliteKeyValueStore;
use shared::confirmation::ask_confirmation;
use shared::types::Result;
use std::path::PathBuf;
use std::time::Duration;
use tracing::{debug, info};

#[derive(Parser, Debug)]
#[command(name = "rutan")]
#[command(about = "RutaÑ: planificador de viajes por España en la terminal")]
pub struct Cli {
    /// Base URL of the itinerary service
    #[arg(long)]
    pub api_url: Option<String>,

    /// Directory holding the local database
    #[arg(long)]
    pub data_dir: Option<PathBuf>,

    /// Model to use (smart, fast, local)
    #[arg(long)]
    pub model: Option<String>,

    /// Request timeout in seconds
    #[arg(long)]
    pub timeout: Option<u64>,

    /// Debug logging on stderr
    #[arg(short, long)]
    pub verbose: bool,

    /// Keep nothing on disk
    #[arg(long)]
    pub ephemeral: bool,

    /// List saved conversations and exit
    #[arg(long)]
    pub list: bool,

    /// Send this message once and exit
    #[arg(trailing_var_arg = true)]
    pub message: Vec<String>,
}

impl Cli {
    /// Command-line flags override environment and defaults.
    pub fn apply(&self, mut config: Config) -> Config {
        if let Some(url) = &self.api_url {
            config.api_url = url.clone();
        }
        if let Some(dir) = &self.data_dir {
            config.data_dir = dir.clone();
        }
        if let Some(secs) = self.timeout.filter(|s| *s > 0) {
            config.request_timeout = Duration::from_secs(secs);
        }
        config
    }
}

pub struct CliApp {
    config: Config,
    pending: Option<Attachment>,
}

impl CliApp {
    pub fn new(config: Config) -> Self {
        Self {
            config,
            pending: None,
        }
    }

    pub async fn run(&mut self, cli: Cli) -> Result<()> {
        self.config = cli.apply(self.config.clone());
        let client = ApiClient::new(&self.config).context("no se pudo crear el cliente HTTP")?;
        info!(api = client.base_url(), ephemeral = cli.ephemeral, "starting");

        if cli.ephemeral {
            self.run_with(client, MemoryStore::new(), &cli).await
        } else {
            let path = self.config.db_path();
            let storage = SqliteKeyValueStore::new(&path)
                .with_context(|| format!("no se pudo abrir {}", path.display()))?;
            self.run_with(client, storage, &cli).await
        }
    }

    async fn run_with<S: KeyValueStore>(&mut self, client: ApiClient, storage: S, cli: &Cli) -> Result<()> {
        let store = ConversationStore::initialize(storage, &self.config.default_model);
        let orch = ChatOrchestrator::new(client, store);

        if let Some(model) = cli.model.as_deref().map(str::to_lowercase) {
            let current = orch.store().lock().await.model().to_string();
            if model != current {
                orch.switch_model(&model).await;
            }
        }

        if cli.list {
            let store = orch.store();
            let store = store.lock().await;
            render::print_conversation_list(&store.list_view(), &store.active().id);
            return Ok(());
        }

        let one_shot = cli.message.join(" ");
        if !one_shot.trim().is_empty() {
            self.send(&orch, &one_shot, None).await;
        } else {
            self.repl(&orch).await?;
        }
        orch.store().lock().await.close();
        Ok(())
    }

    async fn repl<S: KeyValueStore>(&mut self, orch: &ChatOrchestrator<ApiClient, S>) -> Result<()> {
        println!("{}", "RutaÑ · tu experto en viajes por España".red().bold());
        println!("{}", "Escribe /ayuda para ver los comandos.".dimmed());
        Self::print_since(orch, 0).await;

        let theme = ColorfulTheme::default();
        loop {
            let prompt = match &self.pending {
                Some(att) => format!("tú [{}]", att.display_name()),
                None => "tú".to_string(),
            };
            let line: String = match Input::with_theme(&theme)
                .with_prompt(prompt)
                .allow_empty(true)
                .interact_text()
            {
                Ok(line) => line,
                Err(e) => {
                    debug!("input closed: {}", e);
                    break;
                }
            };

            match commands::parse(&line) {
                Command::Message(text) => {
                    if text.is_empty() && self.pending.is_none() {
                        continue;
                    }
                    let attachment = self.pending.take();
                    self.send(orch, &text, attachment).await;
                }
                Command::Help => println!("{}", HELP),
                Command::New => {
                    orch.store().lock().await.new_conversation();
                    println!("{}", render::separator().dimmed());
                    Self::print_since(orch, 0).await;
                }
                Command::List => {
                    let store = orch.store();
                    let store = store.lock().await;
                    render::print_conversation_list(&store.list_view(), &store.active().id);
                }
                Command::Open(n) => {
                    let store = orch.store();
                    let mut store = store.lock().await;
                    let target = store.list_view().get(n - 1).map(|c| c.id.clone());
                    match target {
                        Some(id) if id == store.active().id => {
                            println!("{}", "Ya estás en esa conversación.".yellow());
                        }
                        Some(id) => {
                            store.open_conversation(&id);
                            println!("{}", render::separator().dimmed());
                            render::print_messages(store.transcript());
                        }
                        None => println!("{}", format!("No hay conversación {}", n).red()),
                    }
                }
                Command::Delete(n) => self.delete(orch, n).await?,
                Command::Model(None) => {
                    let model = orch.store().lock().await.model().to_string();
                    println!("Modelo actual: {}", model.bold());
                }
                Command::Model(Some(model)) => {
                    let from = Self::transcript_len(orch).await;
                    orch.switch_model(&model).await;
                    Self::print_since(orch, from).await;
                }
                Command::Generate => {
                    let form = Self::prompt_form(&theme)?;
                    let from = Self::transcript_len(orch).await;
                    let spinner = BusyIndicator::start("Diseñando tu viaje...");
                    let result = orch.generate_from_form(&form).await;
                    spinner.stop().await;
                    Self::report(orch, from, result).await;
                }
                Command::Attach(arg) => {
                    let attachment = Attachment::from_arg(&arg);
                    match attachment.path() {
                        Some(path) if !path.is_file() => {
                            println!("{}", format!("No encuentro el archivo {}", path.display()).red());
                        }
                        _ => {
                            println!("{}", render::emphasize(&attachment.banner(None)));
                            self.pending = Some(attachment);
                        }
                    }
                }
                Command::Detach => {
                    if self.pending.take().is_some() {
                        println!("{}", "Adjunto descartado.".yellow());
                    }
                }
                Command::ShowItinerary => {
                    let store = orch.store();
                    let store = store.lock().await;
                    match store.itinerary() {
                        Some(itinerary) => render::print_itinerary(itinerary),
                        None => println!(
                            "{}",
                            "Esta conversación aún no tiene itinerario. Prueba /generar.".yellow()
                        ),
                    }
                }
                Command::Export(target) => {
                    let itinerary = orch.store().lock().await.itinerary().cloned();
                    match itinerary {
                        Some(itinerary) => {
                            let doc = ItineraryDocument::from_itinerary(&itinerary);
                            let path = target.map(PathBuf::from).unwrap_or_else(|| doc.default_file_name());
                            match doc.write_docx(&path) {
                                Ok(()) => println!("{}", format!("Itinerario guardado en {}", path.display()).green()),
                                Err(e) => println!("{}", format!("No se pudo exportar: {}", e).red()),
                            }
                        }
                        None => println!("{}", "No hay itinerario que exportar.".yellow()),
                    }
                }
                Command::Quit => break,
                Command::Invalid(message) => println!("{}", message.red()),
            }
        }
        Ok(())
    }

    async fn send<S: KeyValueStore>(
        &self,
        orch: &ChatOrchestrator<ApiClient, S>,
        text: &str,
        attachment: Option<Attachment>,
    ) {
        let from = Self::transcript_len(orch).await;
        let spinner = BusyIndicator::start("RutaÑ está pensando...");
        let result = orch.send_message(text, attachment).await;
        spinner.stop().await;
        Self::report(orch, from, result).await;
    }

    async fn report<S: KeyValueStore>(
        orch: &ChatOrchestrator<ApiClient, S>,
        from: usize,
        result: std::result::Result<ExchangeOutcome, ChatError>,
    ) {
        match result {
            Ok(outcome) => {
                Self::print_since(orch, from).await;
                if let ExchangeOutcome::Replied(AssistantReply::Itinerary(_)) = outcome {
                    println!("{}", "/itinerario para verlo · /exportar para guardarlo".dimmed());
                }
            }
            Err(ChatError::EmptyMessage) => {}
            Err(e) => println!("{}", e.to_string().yellow()),
        }
    }

    async fn delete<S: KeyValueStore>(&self, orch: &ChatOrchestrator<ApiClient, S>, n: usize) -> Result<()> {
        let target = {
            let store = orch.store();
            let store = store.lock().await;
            store.list_view().get(n - 1).map(|c| (c.id.clone(), c.title.clone()))
        };
        let Some((id, title)) = target else {
            println!("{}", format!("No hay conversación {}", n).red());
            return Ok(());
        };
        if !ask_confirmation(&format!("¿Borrar \"{}\"?", title), false)? {
            return Ok(());
        }

        let store = orch.store();
        let mut store = store.lock().await;
        let was_active = store.active().id == id;
        store.delete_conversation(&id);
        println!("{}", format!("Conversación \"{}\" borrada.", title).green());
        if was_active {
            println!("{}", render::separator().dimmed());
            render::print_messages(store.transcript());
        }
        Ok(())
    }

    fn prompt_form(theme: &ColorfulTheme) -> Result<TripForm> {
        let destination: String = Input::with_theme(theme)
            .with_prompt("Destino (vacío para que RutaÑ proponga)")
            .allow_empty(true)
            .interact_text()?;
        let days: u32 = Input::with_theme(theme)
            .with_prompt("Días")
            .default(7)
            .interact_text()?;
        let options = Difficulty::all();
        let labels: Vec<&str> = options.iter().map(|d| d.label()).collect();
        let choice = Select::with_theme(theme)
            .with_prompt("Estilo")
            .items(&labels)
            .default(1)
            .interact()?;
        Ok(TripForm {
            destination: destination.trim().to_string(),
            days: days.max(1),
            difficulty: options.get(choice).copied().unwrap_or_default(),
        })
    }

    async fn transcript_len<S: KeyValueStore>(orch: &ChatOrchestrator<ApiClient, S>) -> usize {
        orch.store().lock().await.transcript().len()
    }

    async fn print_since<S: KeyValueStore>(orch: &ChatOrchestrator<ApiClient, S>, from: usize) {
        let store = orch.store();
        let store = store.lock().await;
        let transcript = store.transcript();
        render::print_messages(&transcript[from.min(transcript.len())..]);
    }
}
