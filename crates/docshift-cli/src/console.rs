use docshift_core::{Reporter, Status};

/// Leveled progress lines on the terminal. Warnings go to stderr.
pub struct ConsoleReporter;

impl Reporter for ConsoleReporter {
    fn info(&self, message: &str) {
        println!("  • {message}");
    }

    fn success(&self, message: &str) {
        println!("  ✔ {message}");
    }

    fn warn(&self, message: &str) {
        eprintln!("  ! {message}");
    }
}

pub fn print_status(status: &Status) {
    println!();
    println!("  Applied ({})", status.applied.len());
    for entry in &status.applied {
        println!(
            "    {:<40} {}",
            entry.id,
            entry.end_time.format("%Y-%m-%d %H:%M:%S UTC")
        );
    }

    println!();
    println!("  Pending ({})", status.pending.len());
    for id in &status.pending {
        println!("    {id}");
    }

    if !status.orphans.is_empty() {
        println!();
        println!("  Recorded without a file ({})", status.orphans.len());
        for id in &status.orphans {
            println!("    {id}");
        }
    }
    println!();
}
