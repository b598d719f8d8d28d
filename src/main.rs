//! Interactive viewer binary for the prism deferred compositor.

use std::path::Path;

use prism::options::Options;
use prism::viewer::Viewer;

fn main() {
    env_logger::init();

    // Optional view preset: `prism assets/view_presets/bright.toml`
    let options = match std::env::args().nth(1) {
        Some(path) => match Options::load(Path::new(&path)) {
            Ok(options) => {
                log::info!("loaded preset {path}");
                options
            }
            Err(e) => {
                log::error!("{e}");
                std::process::exit(1);
            }
        },
        None => Options::default(),
    };

    if let Err(e) = Viewer::builder().with_options(options).build().run() {
        log::error!("{e}");
        std::process::exit(1);
    }
}
