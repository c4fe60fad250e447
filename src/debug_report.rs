use templar::{MatchKind, Options, RunResult, Stylesheet, TaskKind};

mod ansi {
    pub const RESET: &str = "\x1b[0m";
    pub const DIM: &str = "\x1b[2m";
    pub const BOLD: &str = "\x1b[1m";

    pub const GREEN: &str = "\x1b[32m";
    pub const YELLOW: &str = "\x1b[33m";
    pub const BLUE: &str = "\x1b[34m";
    pub const CYAN: &str = "\x1b[36m";
    pub const GRAY: &str = "\x1b[90m";

    pub struct Palette {
        enabled: bool,
    }

    impl Palette {
        pub fn new(enabled: bool) -> Self {
            Self { enabled }
        }

        pub fn paint(&self, s: impl AsRef<str>, color: &str) -> String {
            if self.enabled { format!("{}{}{}", color, s.as_ref(), RESET) } else { s.as_ref().to_string() }
        }

        pub fn bold(&self, s: impl AsRef<str>) -> String {
            if self.enabled { format!("{}{}{}", BOLD, s.as_ref(), RESET) } else { s.as_ref().to_string() }
        }

        pub fn dim(&self, s: impl AsRef<str>) -> String {
            if self.enabled { format!("{}{}{}", DIM, s.as_ref(), RESET) } else { s.as_ref().to_string() }
        }
    }
}

/// How many scheduling events to list before summarizing the rest.
const EVENT_PREVIEW: usize = 8;

pub fn print_run(path: &str, sheet: &Stylesheet, run: &RunResult, options: &Options, color: bool) {
    let palette = ansi::Palette::new(color);
    println!("\n{}", palette.bold(palette.paint(format!("⚙  Dispatching: \"{path}\""), ansi::CYAN)));

    println!("\n{}", palette.paint("━━━ Rules ━━━", ansi::GRAY));
    print_rules(sheet, &palette);

    println!("\n{}", palette.paint("━━━ Selections ━━━", ansi::GRAY));
    print_selections(run, &palette);

    println!("\n{}", palette.paint("━━━ Scheduling ━━━", ansi::GRAY));
    print_scheduling(run, options, &palette);

    println!("\n{}", palette.paint("━━━ Timing ━━━", ansi::GRAY));
    println!(
        "  Total: {}  │  Precompile: {}",
        palette.paint(format!("{:?}", run.elapsed), ansi::GREEN),
        palette.dim(format!("{:?}", sheet.compile_time)),
    );
    println!();
}

fn print_rules(sheet: &Stylesheet, palette: &ansi::Palette) {
    let rules = sheet.rules().rules();
    if rules.is_empty() {
        println!("{}", palette.dim("  No rules registered"));
        return;
    }
    for (idx, rule) in rules.iter().enumerate() {
        println!(
            "  {} {} {} {} {}",
            palette.paint(format!("[{idx}]"), ansi::GRAY),
            palette.paint(rule.pattern.as_deref().unwrap_or("?"), ansi::GREEN),
            palette.dim("│"),
            palette.paint(kind_label(rule.kind), ansi::BLUE),
            palette.dim(format!("depth {}  mode {}", rule.depth, rule.mode.as_deref().unwrap_or("-"))),
        );
    }
}

fn print_selections(run: &RunResult, palette: &ansi::Palette) {
    for selection in &run.selections {
        let winner = match (&selection.pattern, selection.kind) {
            (Some(pattern), Some(kind)) => format!(
                "{} {}",
                palette.bold(palette.paint(pattern, ansi::GREEN)),
                palette.dim(format!("({}, depth {})", kind_label(kind), selection.depth))
            ),
            _ => palette.dim("no rule (built-in)"),
        };
        println!(
            "  {} {} {} {}",
            palette.paint(&selection.path, ansi::YELLOW),
            palette.dim(format!("mode {}", selection.mode.as_deref().unwrap_or("-"))),
            palette.dim("→"),
            winner
        );
    }
}

fn print_scheduling(run: &RunResult, options: &Options, palette: &ansi::Palette) {
    println!(
        "  Threads: {}  │  Task mode: {}  │  Eligible: {}",
        palette.paint(options.threads.to_string(), ansi::BLUE),
        palette.paint(options.task_mode.as_str(), ansi::BLUE),
        palette.dim(options.parallel.names().join(",")),
    );
    println!(
        "  Serial: {}  │  Parallel: {}",
        palette.paint(run.serial.to_string(), ansi::YELLOW),
        palette.paint(run.parallel.to_string(), ansi::GREEN),
    );

    for event in run.events.iter().take(EVENT_PREVIEW) {
        let kind = match event.kind {
            TaskKind::Serial => palette.paint("serial  ", ansi::YELLOW),
            TaskKind::Parallel => palette.paint("parallel", ansi::GREEN),
        };
        println!(
            "    {} {} {} {}",
            palette.dim(event.recorded_at.format("%H:%M:%S%.6f").to_string()),
            kind,
            palette.paint(event.instruction.as_deref().unwrap_or("(fork-join root)"), ansi::CYAN),
            palette.dim(format!("branch {} ← {}", event.branch, event.parent.map_or("-".to_string(), |p| p.to_string()))),
        );
    }
    if run.events.len() > EVENT_PREVIEW {
        println!("    {}", palette.dim(format!("... +{} more", run.events.len() - EVENT_PREVIEW)));
    }
}

fn kind_label(kind: MatchKind) -> &'static str {
    match kind {
        MatchKind::Root => "root",
        MatchKind::Always => "always",
        MatchKind::Pattern => "pattern",
        MatchKind::None => "named",
    }
}
