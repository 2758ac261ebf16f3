//! Servidor web Axum com WebSocket para inspeção do etiquetador POS em tempo real

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        Path, State,
    },
    http::StatusCode,
    response::{IntoResponse, Json, Response},
    routing::{get, post},
    Router,
};
use clap::{Parser, ValueEnum};
use pos_core::{
    corpus::demo_treebank,
    open_split_store,
    viterbi::ViterbiColumn,
    EstimationMode, PipelineReport, PosConfig, PosError, PosPipeline,
};
use serde::{Deserialize, Serialize};
use tower_http::cors::{Any, CorsLayer};
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

/// Etiquetador POS (HMM + Viterbi) sobre o treebank METU-Sabancı
#[derive(Parser, Debug)]
#[command(version, about)]
struct Args {
    /// Arquivo CoNLL do treebank; sem ele, usa o corpus de demonstração
    #[arg(long, env = "POS_CORPUS")]
    corpus: Option<PathBuf>,

    /// Endereço de escuta
    #[arg(long, env = "POS_BIND", default_value = "0.0.0.0:3000")]
    bind: SocketAddr,

    /// Arquivo JSON onde a sequência de sorteios da divisão é guardada
    #[arg(long, env = "POS_SPLIT_STORE")]
    split_store: Option<PathBuf>,

    /// Ignora a divisão guardada e sorteia uma nova
    #[arg(long, env = "POS_FRESH_SPLIT")]
    fresh_split: bool,

    /// Regra de estimação das probabilidades
    #[arg(long, env = "POS_ESTIMATION", value_enum, default_value_t = Estimation::Exact)]
    estimation: Estimation,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum Estimation {
    /// count(a→b) / count(a)
    Exact,
    /// Regra incremental legada
    Incremental,
}

impl From<Estimation> for EstimationMode {
    fn from(value: Estimation) -> Self {
        match value {
            Estimation::Exact => EstimationMode::RelativeFrequency,
            Estimation::Incremental => EstimationMode::Incremental,
        }
    }
}

impl Args {
    fn config(&self) -> PosConfig {
        PosConfig {
            force_fresh_random: self.fresh_split,
            estimation_mode: self.estimation.into(),
            split_store_path: self.split_store.clone(),
            ..PosConfig::default()
        }
    }
}

/// Estado compartilhado da aplicação: o resultado de uma execução, só leitura
struct AppState {
    report: PipelineReport,
}

#[derive(Deserialize)]
struct TagRequest {
    text: String,
}

#[derive(Serialize)]
struct TagResponse {
    words: Vec<String>,
    tags: Vec<String>,
    log_prob: f64,
    columns: Vec<ViterbiColumn>,
    elapsed_us: u64,
}

/// Eventos enviados pelo WebSocket
#[derive(Serialize)]
#[serde(tag = "type", content = "data")]
enum WsEvent {
    ViterbiColumn(ViterbiColumn),
    Tagged { words: Vec<String>, tags: Vec<String>, log_prob: f64 },
    Error { message: String },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let args = Args::parse();
    let config = args.config();

    // Leitura do corpus: uma única chamada assíncrona; falha encerra a execução.
    let text = match &args.corpus {
        Some(path) => tokio::fs::read_to_string(path).await.map_err(|err| PosError::CorpusFetch {
            source_name: path.display().to_string(),
            reason: err.to_string(),
        })?,
        None => {
            warn!("nenhum corpus informado; usando o treebank de demonstração");
            demo_treebank()
        }
    };

    let report = tokio::task::spawn_blocking(move || {
        let mut store = open_split_store(&config);
        let mut rng = rand::thread_rng();
        PosPipeline::new(config).run(&text, &mut *store, &mut rng)
    })
    .await
    .context("tarefa do pipeline abortada")??;

    info!("\n{}", report.evaluation);
    if let Some(inspection) = report.inspect_test(0)? {
        info!(
            words = inspection.sentence.len(),
            log_prob = inspection.decoding.log_prob,
            elapsed_us = inspection.decoding.elapsed_us,
            "primeira sentença de teste decodificada"
        );
    }

    let state = Arc::new(AppState { report });

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let app = Router::new()
        .route("/transitions", get(transitions_handler))
        .route("/evaluation", get(evaluation_handler))
        .route("/split", get(split_handler))
        .route("/test/:index", get(test_sentence_handler))
        .route("/tag", post(tag_handler))
        .route("/ws", get(ws_handler))
        .layer(cors)
        .with_state(state);

    let listener = tokio::net::TcpListener::bind(args.bind)
        .await
        .with_context(|| format!("não foi possível escutar em {}", args.bind))?;
    info!("🚀 Servidor POS iniciado em http://{}", args.bind);
    axum::serve(listener, app).await?;
    Ok(())
}

fn error_response(status: StatusCode, message: impl Into<String>) -> Response {
    (status, Json(serde_json::json!({ "error": message.into() }))).into_response()
}

/// Tabela de transição: linhas sem `end`, colunas sem `start`
async fn transitions_handler(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(state.report.transition_table())
}

/// Resumo da avaliação e medidas por tag
async fn evaluation_handler(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(serde_json::json!({
        "summary": state.report.summary(),
        "per_tag": state.report.evaluation.per_tag,
        "malformed": state.report.malformed.len(),
    }))
}

/// Sentenças de treino e de teste
async fn split_handler(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(state.report.split_summary())
}

/// Tabela de emissão e traço do Viterbi de uma sentença de teste
async fn test_sentence_handler(
    State(state): State<Arc<AppState>>,
    Path(index): Path<usize>,
) -> Response {
    match state.report.inspect_test(index) {
        Ok(Some(inspection)) => Json(serde_json::json!({
            "sentence": inspection.sentence,
            "emissions": inspection.emissions,
            "tags": inspection.decoding.tags,
            "correct": inspection.decoding.correct,
            "log_prob": inspection.decoding.log_prob,
            "columns": inspection.decoding.matrix.columns(),
        }))
        .into_response(),
        Ok(None) => error_response(StatusCode::NOT_FOUND, format!("sentença de teste {index} inexistente")),
        Err(err) => error_response(StatusCode::INTERNAL_SERVER_ERROR, err.to_string()),
    }
}

fn tokenize(text: &str) -> Vec<String> {
    text.split_whitespace().map(str::to_string).collect()
}

/// Etiquetagem de uma sentença avulsa via HTTP POST (sem streaming)
async fn tag_handler(State(state): State<Arc<AppState>>, Json(req): Json<TagRequest>) -> Response {
    let words = tokenize(&req.text);
    if words.is_empty() {
        return error_response(StatusCode::BAD_REQUEST, "Texto vazio");
    }

    match state.report.tag(&words) {
        Ok(decoding) => Json(TagResponse {
            columns: decoding.matrix.columns(),
            words,
            tags: decoding.tags,
            log_prob: decoding.log_prob,
            elapsed_us: decoding.elapsed_us,
        })
        .into_response(),
        Err(err) => error_response(StatusCode::INTERNAL_SERVER_ERROR, err.to_string()),
    }
}

/// Upgrade HTTP → WebSocket
async fn ws_handler(ws: WebSocketUpgrade, State(state): State<Arc<AppState>>) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_websocket(socket, state))
}

/// Lógica do WebSocket: recebe uma sentença e envia o Viterbi coluna a coluna
async fn handle_websocket(mut socket: WebSocket, state: Arc<AppState>) {
    info!("WebSocket conectado");

    while let Some(Ok(msg)) = socket.recv().await {
        match msg {
            Message::Text(text) => {
                // Aceita JSON {text} ou texto puro
                let text = serde_json::from_str::<TagRequest>(&text)
                    .map(|req| req.text)
                    .unwrap_or(text);
                let words = tokenize(&text);
                if words.is_empty() {
                    continue;
                }

                info!(words = words.len(), "etiquetando via WebSocket");

                let shared = Arc::clone(&state);
                let handle = tokio::task::spawn_blocking(move || {
                    let result = shared.report.tag(&words);
                    (words, result)
                });

                let events = match handle.await {
                    Ok((words, Ok(decoding))) => {
                        let mut events: Vec<WsEvent> =
                            decoding.matrix.columns().into_iter().map(WsEvent::ViterbiColumn).collect();
                        events.push(WsEvent::Tagged { words, tags: decoding.tags, log_prob: decoding.log_prob });
                        events
                    }
                    Ok((_, Err(err))) => vec![WsEvent::Error { message: err.to_string() }],
                    Err(err) => {
                        error!(%err, "tarefa de decodificação abortada");
                        vec![WsEvent::Error { message: err.to_string() }]
                    }
                };

                for event in &events {
                    if let Ok(json) = serde_json::to_string(event) {
                        if socket.send(Message::Text(json)).await.is_err() {
                            return; // cliente desconectou
                        }
                        // Pequena pausa para animação visual (coluna a coluna)
                        tokio::time::sleep(tokio::time::Duration::from_millis(35)).await;
                    }
                }
            }
            Message::Close(_) => {
                info!("WebSocket desconectado");
                return;
            }
            Message::Ping(payload) => {
                let _ = socket.send(Message::Pong(payload)).await;
            }
            _ => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_args_map_to_config() {
        let args = Args::parse_from(["pos-web", "--fresh-split", "--estimation", "incremental"]);
        let config = args.config();
        assert!(config.force_fresh_random);
        assert_eq!(config.estimation_mode, EstimationMode::Incremental);
        assert_eq!(config.split_store_path, None);
    }

    #[test]
    fn test_tokenize_on_whitespace() {
        assert_eq!(tokenize("  Ali  okula\tgitti .\n"), vec!["Ali", "okula", "gitti", "."]);
        assert!(tokenize("   ").is_empty());
    }
}
