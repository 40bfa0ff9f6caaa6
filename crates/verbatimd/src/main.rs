use std::process::ExitCode;
use std::sync::Arc;

use verbatimd::{StructuredHealthReporter, SystemConfigLoader, bootstrap_with, http_collaborators};

fn main() -> ExitCode {
    let runtime = match tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(error) => {
            eprintln!("verbatimd: failed to start async runtime: {error}");
            return ExitCode::FAILURE;
        }
    };

    runtime.block_on(async {
        let reporter = Arc::new(StructuredHealthReporter::new());
        let daemon = match bootstrap_with(&SystemConfigLoader, reporter).await {
            Ok(daemon) => daemon,
            Err(error) => {
                eprintln!("verbatimd: {error}");
                return ExitCode::FAILURE;
            }
        };
        let collaborators = match http_collaborators(daemon.config()) {
            Ok(collaborators) => collaborators,
            Err(error) => {
                tracing::error!(%error, "failed to build upstream clients");
                return ExitCode::FAILURE;
            }
        };
        match daemon
            .serve(collaborators, verbatimd::transport::shutdown_signal())
            .await
        {
            Ok(()) => ExitCode::SUCCESS,
            Err(error) => {
                tracing::error!(%error, "daemon stopped");
                ExitCode::FAILURE
            }
        }
    })
}
