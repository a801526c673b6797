use std::error::Error;

use log::LevelFilter;
use log4rs::{
    Config,
    append::console::{ConsoleAppender, Target},
    config::{Appender, Root},
    encode::pattern::PatternEncoder,
};

/// Installs a console logger on stderr and routes panics through it.
pub fn init_log(level: LevelFilter) -> Result<(), Box<dyn Error>> {
    let stderr = ConsoleAppender::builder()
        .target(Target::Stderr)
        .encoder(Box::new(PatternEncoder::new("[{h({l})} - {M}] {m}{n}")))
        .build();
    let appender = Appender::builder().build("stderr", Box::new(stderr));
    let root = Root::builder().appender("stderr").build(level);

    let config = Config::builder().appender(appender).build(root)?;

    log4rs::init_config(config)?;
    update_panic_hook();

    Ok(())
}

fn update_panic_hook() {
    let hook = std::panic::take_hook();

    std::panic::set_hook(Box::new(move |info| {
        log::error!("PANIC => {info}");
        hook(info);
    }));
}
