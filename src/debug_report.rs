use cutsheet::{CalculationVerbose, OrderRecord, Outcome, PropertyTrace, Snapshot, Value};

mod ansi {
    pub const RED: &str = "31";
    pub const GREEN: &str = "32";
    pub const YELLOW: &str = "33";
    pub const BLUE: &str = "34";
    pub const CYAN: &str = "36";
    pub const GRAY: &str = "90";

    const BOLD: &str = "1";
    const DIM: &str = "2";

    /// SGR styling that collapses to plain text when color is off.
    pub struct Palette {
        enabled: bool,
    }

    impl Palette {
        pub fn new(enabled: bool) -> Self {
            Self { enabled }
        }

        pub fn paint(&self, s: impl AsRef<str>, sgr: &str) -> String {
            if self.enabled { format!("\x1b[{sgr}m{}\x1b[0m", s.as_ref()) } else { s.as_ref().to_string() }
        }

        pub fn bold(&self, s: impl AsRef<str>) -> String {
            self.paint(s, BOLD)
        }

        pub fn dim(&self, s: impl AsRef<str>) -> String {
            self.paint(s, DIM)
        }
    }
}

pub fn print_run(order: &OrderRecord, snapshot: &Snapshot, res: &CalculationVerbose, color: bool) {
    let palette = ansi::Palette::new(color);
    let details = &res.details;
    println!("\n{}", palette.bold(palette.paint(format!("⚙  Rule set: \"{}\"", details.rule_set_key), ansi::CYAN)));

    println!("\n{}", palette.paint("━━━ Order ━━━", ansi::GRAY));
    print_order(order, &palette);

    println!("\n{}", palette.paint("━━━ Rules ━━━", ansi::GRAY));
    println!(
        "  {} {}  {} {}",
        palette.dim("loaded:"),
        palette.paint(snapshot.len().to_string(), ansi::BLUE),
        palette.dim("│ at:"),
        palette.dim(snapshot.loaded_at().format("%Y-%m-%d %H:%M:%S").to_string()),
    );
    if details.rule_set_empty {
        println!("  {}", palette.paint(format!("✗ no rules for '{}'", details.rule_set_key), ansi::YELLOW));
        if !snapshot.is_empty() {
            let known = snapshot.keys().iter().map(|k| k.as_str()).collect::<Vec<_>>().join(", ");
            println!("  {} {}", palette.dim("known:"), palette.dim(known));
        }
    }
    for trace in &details.traces {
        print_trace(trace, &palette);
    }

    println!("\n{}", palette.paint("━━━ Result ━━━", ansi::GRAY));
    for (property, value) in res.result.iter() {
        println!("  {:<16} {}", palette.paint(property.name(), ansi::BLUE), palette.bold(palette.paint(value.to_string(), ansi::GREEN)));
    }

    println!("\n{}", palette.paint("━━━ Timing ━━━", ansi::GRAY));
    println!(
        "  Total: {}  │  Evaluate: {}",
        palette.paint(format!("{:?}", details.total), ansi::GREEN),
        palette.paint(format!("{:?}", details.evaluate), ansi::CYAN),
    );
    println!();
}

fn print_order(order: &OrderRecord, palette: &ansi::Palette) {
    if order.is_empty() {
        println!("{}", palette.dim("  No fields parsed"));
    }
    for (key, value) in order.fields() {
        let shown = match value {
            Value::Number(_) => palette.paint(value.to_string(), ansi::GREEN),
            Value::Bool(_) => palette.paint(value.to_string(), ansi::YELLOW),
            Value::Text(_) => format!("\"{value}\""),
        };
        println!("  {} {} {}", palette.paint(key, ansi::BLUE), palette.dim("="), shown);
    }
    for url in order.urls() {
        println!("  {} {}", palette.dim("url:"), palette.paint(url, ansi::CYAN));
    }
}

fn print_trace(trace: &PropertyTrace, palette: &ansi::Palette) {
    let status = match &trace.outcome {
        Outcome::Evaluated(v) => palette.paint(format!("✓ {v}"), ansi::GREEN),
        Outcome::NoMatch => palette.dim("✗ no match, default"),
        Outcome::Failed(msg) => palette.paint(format!("✗ {msg}, default"), ansi::RED),
        Outcome::NonFinite(v) => palette.paint(format!("! {v}"), ansi::YELLOW),
    };
    println!("  {} {}", palette.paint(format!("{}:", trace.property.name()), ansi::BLUE), status);

    if trace.considered == 0 {
        return;
    }
    println!(
        "    {} {}  {} {}",
        palette.dim("rules:"),
        palette.paint(trace.considered.to_string(), ansi::YELLOW),
        palette.dim("│ matched:"),
        palette.paint(format!("{:?}", trace.matched), ansi::YELLOW),
    );
    if let (Some(idx), Some(formula)) = (trace.selected, &trace.formula) {
        println!("    {} {}", palette.paint(format!("[{idx}]"), ansi::GRAY), palette.paint(formula, ansi::CYAN));
    }
}
