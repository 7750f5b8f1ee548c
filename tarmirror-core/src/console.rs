use std::env;
use std::io::{self, IsTerminal, Write};
use std::sync::OnceLock;
use std::time::Instant;

static START_TIME: OnceLock<Instant> = OnceLock::new();

fn use_color() -> bool {
    static USE_COLOR: OnceLock<bool> = OnceLock::new();
    *USE_COLOR.get_or_init(|| env::var_os("NO_COLOR").is_none())
}

fn is_tty() -> bool {
    static IS_TTY: OnceLock<bool> = OnceLock::new();
    *IS_TTY.get_or_init(|| io::stderr().is_terminal())
}

fn paint(code: &str, text: &str) -> String {
    if use_color() {
        format!("\u{1b}[{}m{}\u{1b}[0m", code, text)
    } else {
        text.to_string()
    }
}

fn dim(text: &str) -> String {
    paint("2", text)
}

fn green(text: &str) -> String {
    paint("32", text)
}

fn cyan(text: &str) -> String {
    paint("36", text)
}

fn yellow(text: &str) -> String {
    paint("33", text)
}

fn red(text: &str) -> String {
    paint("31", text)
}

pub fn elapsed_secs() -> f32 {
    START_TIME
        .get()
        .map(|t| t.elapsed().as_secs_f32())
        .unwrap_or(0.0)
}

pub fn header(command: &str, version: &str) {
    START_TIME.get_or_init(Instant::now);
    eprintln!("{}", dim(&format!("tarmirror {} v{}", command, version)));
    eprintln!();
}

pub fn step(message: &str) {
    if is_tty() {
        eprint!("\r\u{1b}[K{}\n", dim(message));
        let _ = io::stderr().flush();
    } else {
        eprintln!("{}", dim(message));
    }
}

pub fn progress(emoji: &str, message: &str, current: usize, total: usize) {
    if is_tty() {
        eprint!(
            "\r\u{1b}[K{} {} {}",
            emoji,
            dim(message),
            cyan(&format!("[{}/{}]", current, total))
        );
        let _ = io::stderr().flush();
    }
}

pub fn progress_fraction(emoji: &str, message: &str, fraction: f64) {
    if is_tty() {
        let percent = (fraction.clamp(0.0, 1.0) * 100.0).round();
        eprint!(
            "\r\u{1b}[K{} {} {}",
            emoji,
            dim(message),
            cyan(&format!("[{:>3}%]", percent))
        );
        let _ = io::stderr().flush();
    }
}

pub fn clear_line() {
    if is_tty() {
        eprint!("\r\u{1b}[K");
        let _ = io::stderr().flush();
    }
}

pub fn package(name: &str, version: &str, is_latest: bool) {
    let mark = green("+");
    let latest_label = if is_latest {
        dim(" (latest)")
    } else {
        String::new()
    };
    println!("{} {}@{}{}", mark, name, version, latest_label);
}

pub fn summary(verb: &str, count: usize, seconds: f32) {
    println!();
    let time_str = if seconds < 1.0 {
        format!("{:.0}ms", seconds * 1000.0)
    } else {
        format!("{:.2}s", seconds)
    };
    let noun = if count == 1 { "package" } else { "packages" };
    println!("{} {} {} {}", count, noun, verb, dim(&format!("[{}]", time_str)));
}

pub fn warn(message: &str) {
    let tag = yellow("warn");
    eprintln!("{} {}", tag, message);
}

pub fn error(message: &str) {
    let tag = red("error");
    eprintln!("{} {}", tag, message);
}

pub fn info(message: &str) {
    println!("{}", message);
}
