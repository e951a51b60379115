use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use tracing::{error, info};

mod controller;
mod inputter;
mod logging;
mod model;
mod ui;

use atv::domain::{AtvConfig, AtvError};
use atv::loader;
use controller::Controller;
use model::{Model, Status};
use ui::TableUI;

fn main() -> ExitCode {
    let config = AtvConfig::parse();
    if let Err(e) = logging::init(&config.log_file) {
        eprintln!("Error: could not set up logging: {e}");
        return ExitCode::FAILURE;
    }

    let result = run(&config);
    ratatui::restore();
    match result {
        Err(e) => {
            error!("Terminating: {e}");
            eprintln!("Error: {e}");
            ExitCode::FAILURE
        }
        Ok(_) => ExitCode::SUCCESS,
    }
}

fn run(config: &AtvConfig) -> Result<(), AtvError> {
    let path = shellexpand::full(&config.path)
        .map_err(|e| AtvError::LoadingFailed(format!("invalid path: {e}")))?;
    let loaded = loader::load_data_file(&PathBuf::from(path.as_ref()))?;
    info!("Starting atv on {} ...", loaded.name);

    let mut terminal = ratatui::init();
    let size = terminal.size()?;
    let mut model = Model::init(config, loaded, size.width, size.height)?;
    let mut ui = TableUI::new();
    let controller = Controller::new(config);

    while model.status != Status::QUITTING {
        // Render the current view
        terminal.draw(|f| ui.draw(&model, f))?;

        // Handle events and map to a Message
        let message = controller.handle_event(&model)?;
        model.update(message)?;
    }
    info!("Bye!");
    Ok(())
}
