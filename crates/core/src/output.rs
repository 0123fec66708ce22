//! Terminal output helpers
//!
//! Packages get a stable label color derived from their name so interleaved
//! output from concurrent tasks stays readable.

use colored::*;

const PALETTE: [Color; 6] = [
    Color::TrueColor {
        r: 147,
        g: 112,
        b: 219,
    },
    Color::TrueColor {
        r: 64,
        g: 224,
        b: 208,
    },
    Color::TrueColor {
        r: 255,
        g: 140,
        b: 0,
    },
    Color::TrueColor {
        r: 199,
        g: 21,
        b: 133,
    },
    Color::TrueColor {
        r: 72,
        g: 209,
        b: 204,
    },
    Color::TrueColor {
        r: 138,
        g: 43,
        b: 226,
    },
];

/// Get a consistent color for a package name
pub fn get_package_color(package_name: &str) -> Color {
    let hash = package_name
        .bytes()
        .fold(0u64, |acc, b| acc.wrapping_mul(31).wrapping_add(b as u64));

    PALETTE[(hash % PALETTE.len() as u64) as usize]
}

/// Prefix a line of child output with the colored package name
pub fn prefix_line(package_name: &str, line: &str) -> String {
    format!(
        "{}{} {}",
        package_name.color(get_package_color(package_name)),
        ":".dimmed(),
        line
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn colors_are_stable_per_name() {
        assert_eq!(get_package_color("web-app"), get_package_color("web-app"));
        assert!(PALETTE.contains(&get_package_color("shared")));
    }

    #[test]
    fn prefix_contains_name_and_line() {
        colored::control::set_override(false);
        assert_eq!(prefix_line("web", "compiled"), "web: compiled");
    }
}
