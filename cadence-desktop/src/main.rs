mod headless;
mod interpreter;

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use cadence_core::app::AppContext;
use cadence_core::documents::{DocumentManager, DocumentOpener};
use cadence_core::instance::{GuardConfig, SingleInstanceGuard, DEFAULT_IPC_PORT};
use cadence_core::session::SessionManager;
use cadence_core::settings::{self, Settings};
use cadence_core::translations::Translator;

use headless::HeadlessWindow;
use interpreter::ExternalInterpreter;

fn main() -> ExitCode {
    env_logger::init();

    let args: Vec<PathBuf> = std::env::args_os().skip(1).map(PathBuf::from).collect();

    let runtime = match tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
    {
        Ok(rt) => rt,
        Err(e) => {
            log::error!("Failed to start async runtime: {}", e);
            return ExitCode::FAILURE;
        }
    };

    runtime.block_on(run(args));
    ExitCode::SUCCESS
}

async fn run(args: Vec<PathBuf>) {
    let settings_path = settings::settings_path();
    let settings = Settings::load_from(&settings_path);

    let port = match settings.ide.ipc_port {
        0 => DEFAULT_IPC_PORT,
        port => port,
    };
    let mut guard = SingleInstanceGuard::new(GuardConfig::with_port(port).with_env_override());
    if guard.try_become_primary_or_forward(&args).await {
        return;
    }

    let translator = Arc::new(Translator::load_system());
    let documents = Arc::new(DocumentManager::new());
    let sessions = Arc::new(SessionManager::with_default_dir(documents.clone()));
    let interpreter = Arc::new(ExternalInterpreter::default());
    let window = Arc::new(HeadlessWindow::new(
        translator,
        documents.clone(),
        settings.window.clone(),
    ));

    let app = AppContext::new(
        settings,
        settings_path,
        documents.clone(),
        sessions,
        interpreter,
        window.clone(),
    );
    app.start(window.as_ref(), &args);

    let opener: Arc<dyn DocumentOpener> = documents;
    let server = guard.serve(opener);

    if let Err(e) = tokio::signal::ctrl_c().await {
        log::error!("Failed to wait for shutdown signal: {}", e);
    }

    if let Some(server) = server {
        server.abort();
    }
    app.quit();
}
