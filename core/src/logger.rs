//! Logger initialization: an uptime-stamped `env_logger` formatter, with
//! `RUST_LOG` defaulting to silence every crate except this engine's.

use std::io::Write;
use std::time::Instant;

use log::info;
use once_cell::sync::Lazy;

pub static INIT_INSTANT: Lazy<Instant> = Lazy::new(Instant::now);

#[must_use]
pub fn uptime() -> u64 {
    INIT_INSTANT.elapsed().as_secs()
}

/// Initialize the process-wide logger.
///
/// # Panics
///
/// Must only be called once; a second call panics inside `env_logger`.
pub fn init_logger(filter: log::LevelFilter) {
    let now = Lazy::force(&INIT_INSTANT);

    let mut env = String::new();
    match std::env::var("RUST_LOG") {
        Ok(e) => {
            // SAFETY: called once at process startup, before any other thread reads env vars.
            unsafe {
                std::env::set_var("RUST_LOG", &e);
            }
            env = e;
        }
        Err(_) => {
            // SAFETY: called once at process startup, before any other thread reads env vars.
            unsafe {
                std::env::set_var("RUST_LOG", format!("off,drift={filter}"));
            }
        }
    }

    env_logger::Builder::new()
        .format(move |buf, record| {
            let mut style = buf.style();
            let level = match record.level() {
                log::Level::Debug => {
                    style.set_color(env_logger::fmt::Color::Blue);
                    "D"
                }
                log::Level::Trace => {
                    style.set_color(env_logger::fmt::Color::Magenta);
                    "T"
                }
                log::Level::Info => {
                    style.set_color(env_logger::fmt::Color::White);
                    "I"
                }
                log::Level::Warn => {
                    style.set_color(env_logger::fmt::Color::Yellow);
                    "W"
                }
                log::Level::Error => {
                    style.set_color(env_logger::fmt::Color::Red);
                    "E"
                }
            };
            writeln!(
                buf,
                "| {} | {: >9.3} | {: >30} @ {: <3} | {}",
                style.set_bold(true).value(level),
                buf.style().set_dimmed(true).value(now.elapsed().as_secs_f32()),
                buf.style().set_dimmed(true).value(record.file_static().unwrap_or("???")),
                buf.style().set_dimmed(true).value(record.line().unwrap_or(0)),
                record.args(),
            )
        })
        .write_style(env_logger::WriteStyle::Always)
        .parse_default_env()
        .init();

    if env.is_empty() {
        info!("log level (flag) ... {filter}");
    } else {
        info!("log level (RUST_LOG) ... {env}");
    }
}
