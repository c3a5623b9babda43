use std::path::PathBuf;
use std::time::Duration;

pub fn format_duration(d: Duration) -> String {
    let ms = d.as_millis();
    if ms < 1000 {
        format!("{ms}ms")
    } else {
        format!("{:.1}s", d.as_secs_f64())
    }
}

pub fn print_pass_line(name: &str, elapsed: Duration) {
    println!(
        "  \x1b[32mPASS\x1b[0m  {name}  \x1b[2m{}\x1b[0m",
        format_duration(elapsed)
    );
}

/// Multi-line messages continue under the name column.
pub fn print_fail_line(name: &str, message: &str, elapsed: Duration) {
    println!(
        "  \x1b[31mFAIL\x1b[0m  {name}  \x1b[2m{}\x1b[0m",
        format_duration(elapsed)
    );
    for line in message.lines() {
        println!("        {line}");
    }
}

pub fn print_error_line(name: &str, msg: &str) {
    println!("  \x1b[31m ERR\x1b[0m  {name}  ({msg})");
}

pub fn print_artifacts(paths: &[PathBuf]) {
    if paths.is_empty() {
        return;
    }
    println!();
    println!("Artifacts:");
    for path in paths {
        println!("    {}", path.display());
    }
}
