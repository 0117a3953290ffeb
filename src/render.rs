//! Text frames for the viewer. Everything here is a pure function of the load state, the
//! navigation state and the registry.

use std::fmt::Write;

use crate::config::Registry;
use crate::corpus::{ModelPredictions, Sample, Step};
use crate::loader::{DatasetSource, Datasets, LoadState};
use crate::nav::{self, NavState};
use crate::style::Theme;

pub const LOADING_MESSAGE: &str = "Loading datasets...";
pub const BLANK: &str = "_______";

pub struct View<'a> {
    pub load: &'a LoadState,
    pub nav: NavState,
    pub registry: &'a Registry,
    pub theme: &'a Theme,
}

/// Percentages with two significant-ish figures: `50%`, `9.5%`, `0.40%`.
pub fn format_probability(p: f64) -> String {
    if !p.is_finite() {
        return "?".to_string();
    }
    let percentage = p * 100.0;
    if percentage >= 10.0 {
        format!("{:.0}%", percentage.round())
    } else if percentage >= 1.0 {
        format!("{:.1}%", percentage)
    } else {
        format!("{:.2}%", percentage)
    }
}

/// Makes whitespace-only tokens visible.
pub fn display_token(token: &str) -> String {
    token
        .replace('\n', "\\n")
        .replace('\r', "\\r")
        .replace('\t', "\\t")
}

pub fn frame(view: &View) -> String {
    match view.load {
        LoadState::Loading => format!("(*) {LOADING_MESSAGE}\n"),
        LoadState::Failed(msg) => error_panel(view.theme, "Error Loading Data", msg),
        LoadState::Loaded(datasets) => loaded_frame(view, datasets),
    }
}

/// Short position marker, `sample.step`, 1-based.
pub fn progress(nav: &NavState) -> String {
    format!("{}.{}", nav.cursor.sample + 1, nav.cursor.step + 1)
}

fn error_panel(theme: &Theme, title: &str, msg: &str) -> String {
    format!(
        "{}\n{}\n",
        theme.paint(format!("!! {title}"), theme.error),
        msg
    )
}

fn loaded_frame(view: &View, datasets: &Datasets) -> String {
    let theme = view.theme;
    let index = view.nav.cursor.dataset;
    let title = datasets
        .title(index)
        .or_else(|| view.registry.datasets.get(index).map(|d| d.title.as_str()))
        .unwrap_or("?");

    let mut out = String::new();
    match datasets.dataset(index) {
        None => {
            out += &error_panel(
                theme,
                "No Data Available",
                &format!("Dataset \"{title}\" could not be loaded."),
            );
            out += &dataset_selector(datasets, index, theme);
            out += &theme.paint("Pick another dataset with j/k or `d <n>`.\n", theme.muted);
        }
        Some([]) => {
            out += &error_panel(
                theme,
                "No Data Available",
                &format!("Dataset \"{title}\" has no samples."),
            );
            out += &dataset_selector(datasets, index, theme);
            out += &theme.paint("Pick another dataset with j/k or `d <n>`.\n", theme.muted);
        }
        Some(samples) => match nav::step_at(samples, &view.nav.cursor) {
            None => {
                out += &error_panel(
                    theme,
                    "Invalid Position",
                    &format!(
                        "Article {} step {} does not exist in \"{title}\".",
                        view.nav.cursor.sample + 1,
                        view.nav.cursor.step + 1
                    ),
                );
                out += &dataset_selector(datasets, index, theme);
            }
            Some(step) => out += &step_frame(view, datasets, samples, step),
        },
    }
    out
}

fn dataset_selector(datasets: &Datasets, active: usize, theme: &Theme) -> String {
    let names: Vec<String> = datasets
        .entries()
        .iter()
        .enumerate()
        .map(|(i, entry)| {
            if i == active {
                theme.paint(format!("[{}: {}]", i + 1, entry.title), theme.active)
            } else {
                format!("{}: {}", i + 1, entry.title)
            }
        })
        .collect();
    format!("Dataset: {}\n", names.join("  "))
}

fn step_frame(view: &View, datasets: &Datasets, samples: &[Sample], step: &Step) -> String {
    let theme = view.theme;
    let nav = &view.nav;
    let sample = &samples[nav.cursor.sample];
    let mut out = String::new();

    writeln!(
        out,
        "{}  article {}/{}  step {}/{}",
        theme.paint(progress(nav), theme.header),
        nav.cursor.sample + 1,
        samples.len(),
        nav.cursor.step + 1,
        sample.steps.len()
    )
    .unwrap();
    out += &dataset_selector(datasets, nav.cursor.dataset, theme);
    if let Some(title) = &sample.article_title {
        writeln!(out, "Article: {title}").unwrap();
    }

    out += "\nFill in the blank.\n";
    let blank = if nav.reveal.answer {
        theme.paint(format!("[{}]", display_token(&step.next_actual_token)), theme.answer)
    } else {
        BLANK.to_string()
    };
    writeln!(out, "{}{}\n", step.prefix, blank).unwrap();

    if step.has_predictions() {
        for (key, name, subtitle) in panel_models(step, view.registry) {
            out += &model_panel(view, step, key, &name, &subtitle);
        }
    } else {
        writeln!(
            out,
            "{}",
            theme.paint("No model predictions available for this step.", theme.muted)
        )
        .unwrap();
    }

    if nav.reveal.answer {
        writeln!(
            out,
            "\nAnswer: {}",
            theme.paint(
                format!("'{}'", display_token(&step.next_actual_token)),
                theme.answer
            )
        )
        .unwrap();
    } else {
        writeln!(out, "\nAnswer: ?").unwrap();
    }

    out += &controls(view, datasets);
    out
}

/// Configured models first, then any others the step has predictions for.
fn panel_models<'a>(step: &'a Step, registry: &'a Registry) -> Vec<(&'a str, String, String)> {
    let mut res: Vec<(&str, String, String)> = registry
        .models
        .iter()
        .map(|m| (m.key.as_str(), m.name.clone(), m.subtitle.clone()))
        .collect();
    for key in step.predictions.model_keys() {
        if registry.model(key).is_none() {
            res.push((key, key.to_string(), String::new()));
        }
    }
    res
}

fn model_panel(view: &View, step: &Step, key: &str, name: &str, subtitle: &str) -> String {
    let theme = view.theme;
    let mut out = String::new();
    if subtitle.is_empty() {
        writeln!(out, "{}", theme.paint(name, theme.header)).unwrap();
    } else {
        writeln!(
            out,
            "{}  {}",
            theme.paint(name, theme.header),
            theme.paint(format!("({subtitle})"), theme.muted)
        )
        .unwrap();
    }

    if !view.nav.reveal.predictions {
        writeln!(out, "  {}", theme.paint("(hidden)", theme.muted)).unwrap();
        return out;
    }

    match step.predictions.for_model(key) {
        Some(ModelPredictions::Ranked(candidates)) if !candidates.is_empty() => {
            for cand in candidates {
                let correct = view.nav.reveal.answer && cand.token == step.next_actual_token;
                let token = format!("'{}'", display_token(&cand.token));
                writeln!(
                    out,
                    "  {} {}  {}",
                    if correct { "*" } else { " " },
                    theme.paint(format!("{:>6}", format_probability(cand.probability)), theme.probability),
                    if correct {
                        theme.paint(token, theme.correct)
                    } else {
                        token
                    }
                )
                .unwrap();
            }
        }
        Some(ModelPredictions::ModelError(msg)) => {
            writeln!(out, "  {}", theme.paint(format!("ERROR: {msg}"), theme.error)).unwrap();
        }
        _ => {
            writeln!(out, "  {}", theme.paint("(no predictions)", theme.muted)).unwrap();
        }
    }
    out
}

fn controls(view: &View, datasets: &Datasets) -> String {
    let theme = view.theme;
    let back = if nav::is_backward_terminal(view.nav, datasets) {
        theme.paint("[ ] back", theme.muted)
    } else {
        "[<] back (b)".to_string()
    };
    let forward = if nav::is_forward_terminal(view.nav, datasets) {
        theme.paint("[ ] forward", theme.muted)
    } else {
        "[>] forward (f, Enter)".to_string()
    };
    format!("\n{back}    {forward}\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::corpus::parse_dataset;
    use crate::loader::LoadedDataset;
    use crate::nav::{reduce, Event};

    const DATA: &str = r#"[
        {"article_title": "Cats", "steps": [
            {"prefix": "The cat sat on the", "next_actual_token": " mat",
             "predictions": {
                "gpt2": [{"token": " floor", "probability": 0.5}, {"token": " mat", "probability": 0.095}],
                "llama3": [{"error": "timed out"}],
                "mistral": [{"token": " mat", "probability": 0.004}]
             }},
            {"prefix": "The cat sat on the mat", "next_actual_token": "\n"}
        ]}
    ]"#;

    fn loaded(sets: Vec<Option<&str>>) -> LoadState {
        LoadState::Loaded(Datasets::new(
            sets.into_iter()
                .enumerate()
                .map(|(i, text)| LoadedDataset {
                    title: format!("set{i}"),
                    data: text.map(|t| parse_dataset(t).unwrap()),
                })
                .collect(),
        ))
    }

    fn render(load: &LoadState, nav: NavState) -> String {
        let registry = Registry::builtin();
        let theme = Theme::plain();
        frame(&View {
            load,
            nav,
            registry: &registry,
            theme: &theme,
        })
    }

    fn forwards(load: &LoadState, n: usize) -> NavState {
        let datasets = load.datasets().unwrap();
        let mut state = NavState::default();
        for _ in 0..n {
            state = reduce(state, Event::Forward, datasets);
        }
        state
    }

    #[test]
    fn probability_formatting() {
        assert_eq!(format_probability(0.5), "50%");
        assert_eq!(format_probability(0.095), "9.5%");
        assert_eq!(format_probability(0.004), "0.40%");
        assert_eq!(format_probability(1.0), "100%");
        assert_eq!(format_probability(0.1), "10%");
        assert_eq!(format_probability(0.01), "1.0%");
        assert_eq!(format_probability(0.0), "0.00%");
        assert_eq!(format_probability(f64::NAN), "?");
    }

    #[test]
    fn loading_and_failure_panels() {
        assert!(render(&LoadState::Loading, NavState::default()).contains(LOADING_MESSAGE));
        let out = render(&LoadState::Failed("disk on fire".to_string()), NavState::default());
        assert!(out.contains("Error Loading Data"));
        assert!(out.contains("disk on fire"));
    }

    #[test]
    fn blank_then_predictions_then_answer() {
        let load = loaded(vec![Some(DATA)]);

        let out = render(&load, forwards(&load, 0));
        assert!(out.contains("The cat sat on the_______"));
        assert!(out.contains("Article: Cats"));
        assert!(out.contains("1.1  article 1/1  step 1/2"));
        assert!(out.contains("GPT-2  (1.5B params, 2019)"));
        assert!(out.contains("(hidden)"));
        assert!(!out.contains("50%"));
        assert!(out.contains("Answer: ?"));
        assert!(out.contains("[ ] back"));
        assert!(out.contains("[>] forward"));

        let out = render(&load, forwards(&load, 1));
        assert!(out.contains("      50%  ' floor'"));
        assert!(out.contains("     9.5%  ' mat'"));
        assert!(out.contains("ERROR: timed out"));
        // Models outside the registry still get a panel.
        assert!(out.contains("mistral"));
        assert!(out.contains("   0.40%  ' mat'"));
        assert!(!out.contains('*'));
        assert!(out.contains("[<] back"));

        let out = render(&load, forwards(&load, 2));
        assert!(out.contains("The cat sat on the[ mat]"));
        assert!(out.contains("  *   9.5%  ' mat'"));
        assert!(out.contains("    50%  ' floor'"));
        assert!(out.contains("Answer: ' mat'"));
    }

    #[test]
    fn answer_only_step() {
        let load = loaded(vec![Some(DATA)]);

        let out = render(&load, forwards(&load, 3));
        assert!(out.contains("No model predictions available for this step."));
        assert!(out.contains("1.2"));
        assert!(out.contains("[>] forward"));

        let out = render(&load, forwards(&load, 4));
        assert!(out.contains("Answer: '\\n'"));
        // The revealed blank is escaped too, so the prefix line stays one line.
        assert!(out.contains("The cat sat on the mat[\\n]\n"));
        assert!(out.contains("[<] back"));
        assert!(out.contains("[ ] forward"));
    }

    #[test]
    fn unavailable_and_empty_datasets() {
        let load = loaded(vec![None, Some("[]")]);
        let out = render(&load, NavState::default());
        assert!(out.contains("No Data Available"));
        assert!(out.contains("could not be loaded"));
        assert!(out.contains("[1: set0]  2: set1"));

        let datasets = load.datasets().unwrap();
        let second = reduce(NavState::default(), Event::NextDataset, datasets);
        let out = render(&load, second);
        assert!(out.contains("has no samples"));
        assert!(out.contains("1: set0  [2: set1]"));
    }

    #[test]
    fn out_of_range_cursor_renders_an_error() {
        let load = loaded(vec![Some(DATA)]);
        let mut nav = NavState::default();
        nav.cursor.sample = 7;
        let out = render(&load, nav);
        assert!(out.contains("Invalid Position"));
        assert!(out.contains("Article 8 step 1"));
    }

    #[test]
    fn tokens_are_escaped() {
        assert_eq!(display_token("a\nb\tc\r"), "a\\nb\\tc\\r");
        assert_eq!(display_token(" plain"), " plain");
    }
}
