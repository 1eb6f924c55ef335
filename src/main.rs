use nvd_connector::application::Application;

use log::error;
use std::process::ExitCode;

fn main() -> ExitCode {
    let mut application = Application::new();
    application.read_argv();
    application.init_logger();

    if let Err(e) = application.run() {
        error!("{}", e);
        eprintln!("Error: {}", e);
        return ExitCode::FAILURE;
    }
    ExitCode::SUCCESS
}
