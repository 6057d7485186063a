use std::process::ExitCode;

#[tokio::main]
async fn main() -> ExitCode {
    todo_calendar::init_tracing();

    let workspace_root = match std::env::current_dir() {
        Ok(path) => path,
        Err(error) => {
            tracing::error!(%error, "failed to resolve current directory");
            return ExitCode::FAILURE;
        }
    };

    match todo_calendar::run(workspace_root).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(error) => {
            tracing::error!(%error, "todo-calendar failed");
            ExitCode::FAILURE
        }
    }
}
