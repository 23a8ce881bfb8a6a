use application::conversation_store::{ConversationStore, CONVERSATIONS_KEY, SESSION_KEY};
use application::orchestrator::{Difficulty, ExchangeOutcome, TripForm};
use domain::attachment::Attachment;
use domain::reply::AssistantReply;
use domain::storage::{KeyValueStore, MemoryStore};
use infrastructure::export::ItineraryDocument;
use infrastructure::kv_store::SqliteKeyValueStore;
use serde_json::json;
use tests::{sample_itinerary, TravelMockServer};

#[tokio::test]
async fn chat_then_itinerary_over_http() {
    let server = TravelMockServer::new().await;
    server
        .mock_generate_matching(
            json!({"extra_info": "Quiero ir a Toledo"}),
            json!({"mensaje_chat": "¿Cuántos días tienes?"}),
        )
        .await;
    server
        .mock_generate_matching(json!({"extra_info": "Tres días"}), sample_itinerary("Toledo"))
        .await;

    let storage = MemoryStore::new();
    let orch = server.orchestrator(storage.clone());

    let first = orch.send_message("Quiero ir a Toledo", None).await.unwrap();
    assert_eq!(first, ExchangeOutcome::Replied(AssistantReply::Chat("¿Cuántos días tienes?".into())));
    let second = orch.send_message("Tres días", None).await.unwrap();
    assert!(matches!(second, ExchangeOutcome::Replied(AssistantReply::Itinerary(_))));

    let store = orch.store();
    let store = store.lock().await;
    assert_eq!(store.active().title, "Toledo");
    assert_eq!(store.itinerary().map(|i| i.day_views().len()), Some(3));
    assert_eq!(store.transcript().last().unwrap().content, "He preparado tu ruta por Toledo.");

    let bodies = server.generate_bodies().await;
    assert_eq!(bodies.len(), 2);
    assert_eq!(bodies[0]["session_id"], json!(store.session_id()));
    assert_eq!(bodies[0]["model"], json!("smart"));
    assert_eq!(bodies[0]["destination"], json!(""));
    assert!(storage.get(CONVERSATIONS_KEY).unwrap().unwrap().contains("Toledo"));
}

#[tokio::test]
async fn server_error_is_shown_but_not_saved() {
    let server = TravelMockServer::new().await;
    server.mock_generate_error(502, "proveedor caído").await;
    let storage = MemoryStore::new();
    let orch = server.orchestrator(storage.clone());

    let outcome = orch.send_message("Hola", None).await.unwrap();
    assert_eq!(
        outcome,
        ExchangeOutcome::Failed("❌ Error: Error del servidor: 502 - proveedor caído".into())
    );
    let store = orch.store();
    let store = store.lock().await;
    assert_eq!(store.transcript().len(), 3);
    // The user's turn is kept, the error line is not.
    let saved = storage.get(CONVERSATIONS_KEY).unwrap().unwrap();
    assert!(saved.contains("Hola"));
    assert!(!saved.contains("❌"));
    assert_eq!(store.conversations()[0].messages.len(), 2);
}

#[tokio::test]
async fn embedded_itinerary_in_text_is_recovered() {
    let server = TravelMockServer::new().await;
    server
        .mock_generate(json!({
            "itinerary": "Claro. {\"es_itinerario\":true,\"titulo\":\"Madrid\"} ¡Disfruta!"
        }))
        .await;
    let orch = server.orchestrator(MemoryStore::new());
    let outcome = orch.send_message("Madrid", None).await.unwrap();
    match outcome {
        ExchangeOutcome::Replied(AssistantReply::Itinerary(it)) => {
            assert_eq!(it.title.as_deref(), Some("Madrid"));
        }
        other => panic!("expected itinerary, got {:?}", other),
    }
}

#[tokio::test]
async fn uploaded_analysis_reaches_generation() {
    let server = TravelMockServer::new().await;
    server.mock_upload("Vuelo a Bilbao el 3 de mayo").await;
    server.mock_generate(json!({"mensaje_chat": "Perfecto"})).await;
    let dir = tempfile::tempdir().unwrap();
    let file = dir.path().join("vuelo.txt");
    std::fs::write(&file, "IB1234 MAD-BIO").unwrap();

    let orch = server.orchestrator(MemoryStore::new());
    orch.send_message("Planifica alrededor de esto", Some(Attachment::from_arg(file.to_str().unwrap())))
        .await
        .unwrap();

    let bodies = server.generate_bodies().await;
    assert_eq!(
        bodies[0]["extra_info"],
        json!("Planifica alrededor de esto\n\n[ANÁLISIS DEL ARCHIVO COMPARTIDO]:\nVuelo a Bilbao el 3 de mayo")
    );
}

#[tokio::test]
async fn rejected_upload_sends_text_alone() {
    let server = TravelMockServer::new().await;
    server.mock_upload_error(413).await;
    server.mock_generate(json!({"mensaje_chat": "Sin adjunto, pero te ayudo"})).await;
    let dir = tempfile::tempdir().unwrap();
    let file = dir.path().join("mapa.png");
    std::fs::write(&file, [0x89, b'P', b'N', b'G']).unwrap();

    let orch = server.orchestrator(MemoryStore::new());
    orch.send_message("Mira el mapa", Some(Attachment::from_arg(file.to_str().unwrap())))
        .await
        .unwrap();

    let bodies = server.generate_bodies().await;
    assert_eq!(bodies[0]["extra_info"], json!("Mira el mapa"));
    let store = orch.store();
    let store = store.lock().await;
    assert!(store.transcript()[1].content.starts_with("🖼️ **Archivo Adjunto:** mapa.png"));
}

#[tokio::test]
async fn form_generation_and_model_switch() {
    let server = TravelMockServer::new().await;
    server.mock_model_check("ollama").await;
    server
        .mock_generate_matching(
            json!({"destination": "Cantabria", "duration": "4 días", "model": "local"}),
            sample_itinerary("Cantabria"),
        )
        .await;

    let orch = server.orchestrator(MemoryStore::new());
    orch.switch_model("local").await;
    orch.generate_from_form(&TripForm {
        destination: "Cantabria".into(),
        days: 4,
        difficulty: Difficulty::Low,
    })
    .await
    .unwrap();

    let store = orch.store();
    let store = store.lock().await;
    let contents: Vec<&str> = store.transcript().iter().map(|m| m.content.as_str()).collect();
    assert_eq!(
        &contents[1..],
        [
            "🔁 Modelo cambiado a **local**",
            "🔍 Provider: **ollama** (conectado)",
            "Genera un viaje a Cantabria...",
            "He preparado tu ruta por Cantabria.",
        ]
    );
}

#[tokio::test]
async fn state_survives_restart_on_sqlite() {
    let server = TravelMockServer::new().await;
    server.mock_generate(sample_itinerary("Cáceres")).await;
    let dir = tempfile::tempdir().unwrap();
    let db = dir.path().join("rutan.db");

    let (session, id) = {
        let orch = server.orchestrator(SqliteKeyValueStore::new(&db).unwrap());
        orch.send_message("Quiero ir a Cáceres", None).await.unwrap();
        let store = orch.store();
        let mut store = store.lock().await;
        store.close();
        (store.session_id().to_string(), store.active().id.clone())
    };

    let storage = SqliteKeyValueStore::new(&db).unwrap();
    assert_eq!(storage.get(SESSION_KEY).unwrap().as_deref(), Some(session.as_str()));
    let reopened = ConversationStore::initialize(storage, "smart");
    assert_eq!(reopened.active().id, id);
    assert_eq!(reopened.session_id(), session);
    assert_eq!(reopened.active().title, "Cáceres");
    assert!(reopened.itinerary().is_some());
}

#[tokio::test]
async fn exported_document_is_written() {
    let server = TravelMockServer::new().await;
    server.mock_generate(sample_itinerary("Ourense")).await;
    let orch = server.orchestrator(MemoryStore::new());
    orch.send_message("Ourense y sus termas", None).await.unwrap();

    let itinerary = orch.store().lock().await.itinerary().cloned().unwrap();
    let doc = ItineraryDocument::from_itinerary(&itinerary);
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join(doc.default_file_name());
    doc.write_docx(&path).unwrap();
    assert!(path.ends_with("itinerario-ourense.docx"));
    assert!(std::fs::metadata(&path).unwrap().len() > 0);
}
