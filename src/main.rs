use eframe::egui;
use stickerfe::app::StickerFEApp;
use stickerfe::{cli, logger};

fn main() -> Result<(), eframe::Error> {
    // -- CLI / headless mode ---------------------------------------------
    if cli::CliArgs::is_cli_mode() {
        use clap::Parser;
        let args = cli::CliArgs::parse();
        std::process::exit(cli::run(args));
    }

    // -- GUI mode -----------------------------------------------------

    // Initialize session log (overwrites previous session log)
    logger::init();

    // Define the native window options
    let options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default()
            .with_inner_size([1180.0, 760.0])
            .with_title("StickerFE"),
        ..Default::default()
    };

    // Run the application
    eframe::run_native(
        "StickerFE",
        options,
        Box::new(|cc| Box::new(StickerFEApp::new(cc))),
    )
}
