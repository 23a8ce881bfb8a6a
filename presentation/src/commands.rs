/// One line typed at the prompt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Help,
    New,
    List,
    Open(usize),
    Delete(usize),
    /// `None` shows the current model.
    Model(Option<String>),
    Generate,
    Attach(String),
    Detach,
    ShowItinerary,
    Export(Option<String>),
    Quit,
    Message(String),
    Invalid(String),
}

pub const MODELS: [&str; 3] = ["smart", "fast", "local"];

pub const HELP: &str = "\
/nuevo               empieza una conversación nueva
/lista               muestra las conversaciones guardadas
/abrir <n>           abre la conversación n
/borrar <n>          borra la conversación n
/modelo [nombre]     cambia de modelo (smart, fast, local)
/generar             diseña un viaje con destino, días y estilo
/adjuntar <ruta|url> adjunta un archivo o enlace al próximo mensaje
/quitar              descarta el adjunto pendiente
/itinerario          muestra el itinerario de la conversación
/exportar [ruta]     guarda el itinerario como documento .docx
/salir               termina la sesión";

fn index_arg(arg: Option<&str>, usage: &str) -> Result<usize, String> {
    arg.and_then(|a| a.parse::<usize>().ok())
        .filter(|n| *n > 0)
        .ok_or_else(|| format!("Uso: {}", usage))
}

pub fn parse(line: &str) -> Command {
    let line = line.trim();
    if !line.starts_with('/') {
        return Command::Message(line.to_string());
    }

    let (name, rest) = match line.split_once(char::is_whitespace) {
        Some((name, rest)) => (name, Some(rest.trim()).filter(|r| !r.is_empty())),
        None => (line, None),
    };

    let parsed = match name.to_lowercase().as_str() {
        "/ayuda" | "/help" => Ok(Command::Help),
        "/nuevo" => Ok(Command::New),
        "/lista" => Ok(Command::List),
        "/abrir" => index_arg(rest, "/abrir <n>").map(Command::Open),
        "/borrar" => index_arg(rest, "/borrar <n>").map(Command::Delete),
        "/modelo" => match rest {
            None => Ok(Command::Model(None)),
            Some(m) if MODELS.contains(&m.to_lowercase().as_str()) => {
                Ok(Command::Model(Some(m.to_lowercase())))
            }
            Some(m) => Err(format!("Modelo desconocido '{}'. Opciones: {}", m, MODELS.join(", "))),
        },
        "/generar" => Ok(Command::Generate),
        "/adjuntar" => rest
            .map(|r| Command::Attach(r.to_string()))
            .ok_or_else(|| "Uso: /adjuntar <ruta|url>".to_string()),
        "/quitar" => Ok(Command::Detach),
        "/itinerario" => Ok(Command::ShowItinerary),
        "/exportar" => Ok(Command::Export(rest.map(str::to_string))),
        "/salir" | "/exit" => Ok(Command::Quit),
        other => Err(format!("Comando desconocido: {}. Escribe /ayuda.", other)),
    };
    parsed.unwrap_or_else(Command::Invalid)
}
