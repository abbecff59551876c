use bytesize::ByteSize;
use colored::*;

/// Format bytes into human-readable size string (binary units)
pub fn format_size(bytes: u64) -> String {
    // bytesize spells the binary kilo prefix "kiB"
    ByteSize::b(bytes).to_string_as(true).replace("kiB", "KiB")
}

/// Format size with color based on magnitude
pub fn format_size_colored(bytes: u64) -> ColoredString {
    let s = format_size(bytes);
    const GB: u64 = 1024 * 1024 * 1024;
    const GB100: u64 = 100 * GB;

    if bytes >= GB100 {
        s.red().bold()
    } else if bytes >= GB {
        s.yellow()
    } else {
        s.white()
    }
}

/// Format file count with appropriate plural
pub fn format_count(count: usize) -> String {
    if count == 1 {
        "1 file".to_string()
    } else {
        format!("{} files", count)
    }
}

/// Print a section header
pub fn print_header(title: &str) {
    println!();
    println!("{}", title.bold().underline());
    println!();
}

/// Print a key-value pair
pub fn print_kv(key: &str, value: &str) {
    println!("  {}: {}", key.dimmed(), value);
}
