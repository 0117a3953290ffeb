//! Navigation over (dataset, sample, step, reveal phase).
//!
//! Three nested machines: a per-step reveal phase, a position over samples and steps, and a
//! dataset selector. Changing the dataset always resets the inner two.

use crate::corpus::{Sample, Step};
use crate::loader::DatasetSource;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Cursor {
    pub dataset: usize,
    pub sample: usize,
    pub step: usize,
}

/// Which parts of the active step are visible.
///
/// Steps with predictions go hidden -> predictions -> predictions + answer. Steps without
/// predictions go hidden -> answer, and never have `predictions` set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Reveal {
    pub predictions: bool,
    pub answer: bool,
}

impl Reveal {
    pub const HIDDEN: Reveal = Reveal {
        predictions: false,
        answer: false,
    };

    /// The last phase of a step.
    pub fn full(has_predictions: bool) -> Reveal {
        Reveal {
            predictions: has_predictions,
            answer: true,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct NavState {
    pub cursor: Cursor,
    pub reveal: Reveal,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Event {
    ChangeDataset(usize),
    NextDataset,
    PrevDataset,
    Forward,
    Backward,
    Reset,
}

pub fn reduce<D: DatasetSource + ?Sized>(state: NavState, event: Event, data: &D) -> NavState {
    match event {
        Event::ChangeDataset(i) => {
            if i < data.dataset_count() && i != state.cursor.dataset {
                select_dataset(i, data)
            } else {
                state
            }
        }
        Event::NextDataset => {
            if state.cursor.dataset + 1 < data.dataset_count() {
                select_dataset(state.cursor.dataset + 1, data)
            } else {
                state
            }
        }
        Event::PrevDataset => {
            if state.cursor.dataset > 0 {
                select_dataset(state.cursor.dataset - 1, data)
            } else {
                state
            }
        }
        Event::Forward => match data.dataset(state.cursor.dataset) {
            Some(samples) => forward(state, samples),
            None => state,
        },
        Event::Backward => match data.dataset(state.cursor.dataset) {
            Some(samples) => backward(state, samples),
            None => state,
        },
        Event::Reset => select_dataset(state.cursor.dataset, data),
    }
}

/// The first step of the first sample that has any, hidden.
fn select_dataset<D: DatasetSource + ?Sized>(dataset: usize, data: &D) -> NavState {
    let sample = data
        .dataset(dataset)
        .and_then(|samples| samples.iter().position(|s| !s.steps.is_empty()))
        .unwrap_or(0);
    NavState {
        cursor: Cursor {
            dataset,
            sample,
            step: 0,
        },
        reveal: Reveal::HIDDEN,
    }
}

fn on_empty_sample(samples: &[Sample], cursor: &Cursor) -> bool {
    samples
        .get(cursor.sample)
        .is_some_and(|s| s.steps.is_empty())
}

pub fn step_at<'a>(samples: &'a [Sample], cursor: &Cursor) -> Option<&'a Step> {
    samples.get(cursor.sample)?.steps.get(cursor.step)
}

fn forward(state: NavState, samples: &[Sample]) -> NavState {
    let Some(step) = step_at(samples, &state.cursor) else {
        if on_empty_sample(samples, &state.cursor) {
            if let Some((s, t)) = next_position(samples, &state.cursor) {
                return NavState {
                    cursor: Cursor {
                        sample: s,
                        step: t,
                        ..state.cursor
                    },
                    reveal: Reveal::HIDDEN,
                };
            }
        }
        tracing::warn!(cursor = ?state.cursor, "forward from a missing step");
        return state;
    };

    let mut res = state;
    if !state.reveal.predictions && step.has_predictions() {
        res.reveal.predictions = true;
    } else if !state.reveal.answer {
        res.reveal.answer = true;
    } else if let Some((s, t)) = next_position(samples, &state.cursor) {
        res.cursor.sample = s;
        res.cursor.step = t;
        res.reveal = Reveal::HIDDEN;
    }
    res
}

fn backward(state: NavState, samples: &[Sample]) -> NavState {
    let Some(step) = step_at(samples, &state.cursor) else {
        if on_empty_sample(samples, &state.cursor) {
            let start = Cursor {
                step: 0,
                ..state.cursor
            };
            if let Some((s, t)) = prev_position(samples, &start) {
                return NavState {
                    cursor: Cursor {
                        sample: s,
                        step: t,
                        ..state.cursor
                    },
                    reveal: Reveal::full(samples[s].steps[t].has_predictions()),
                };
            }
        }
        tracing::warn!(cursor = ?state.cursor, "backward from a missing step");
        return state;
    };

    let mut res = state;
    if state.reveal.answer {
        res.reveal.answer = false;
        if !step.has_predictions() {
            res.reveal.predictions = false;
        }
    } else if state.reveal.predictions {
        res.reveal.predictions = false;
    } else if let Some((s, t)) = prev_position(samples, &state.cursor) {
        res.cursor.sample = s;
        res.cursor.step = t;
        // Land on the previous step fully revealed, in its own collapsed form.
        res.reveal = Reveal::full(samples[s].steps[t].has_predictions());
    }
    res
}

// Samples with no steps are malformed; moving between samples skips over them.
fn next_position(samples: &[Sample], cursor: &Cursor) -> Option<(usize, usize)> {
    if cursor.step + 1 < samples.get(cursor.sample)?.steps.len() {
        return Some((cursor.sample, cursor.step + 1));
    }
    (cursor.sample + 1..samples.len())
        .find(|&i| !samples[i].steps.is_empty())
        .map(|i| (i, 0))
}

fn prev_position(samples: &[Sample], cursor: &Cursor) -> Option<(usize, usize)> {
    if cursor.step > 0 {
        return Some((cursor.sample, cursor.step - 1));
    }
    (0..cursor.sample.min(samples.len()))
        .rev()
        .find(|&i| !samples[i].steps.is_empty())
        .map(|i| (i, samples[i].steps.len() - 1))
}

/// Forward would not change anything: the last phase of the last step, or no step at all.
pub fn is_forward_terminal<D: DatasetSource + ?Sized>(state: NavState, data: &D) -> bool {
    reduce(state, Event::Forward, data) == state
}

/// Backward would not change anything: the first phase of the first step, or no step at all.
pub fn is_backward_terminal<D: DatasetSource + ?Sized>(state: NavState, data: &D) -> bool {
    reduce(state, Event::Backward, data) == state
}

/// The cursor is not on a step of the active dataset (out of bounds, or on a sample with no
/// steps) and a `Reset` would move it.
pub fn needs_reset<D: DatasetSource + ?Sized>(state: NavState, data: &D) -> bool {
    match data.dataset(state.cursor.dataset) {
        Some(samples) => {
            step_at(samples, &state.cursor).is_none()
                && reduce(state, Event::Reset, data) != state
        }
        None => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::corpus::{Candidate, ModelPredictions, Predictions};
    use crate::loader::{Datasets, LoadedDataset};

    fn step(with_predictions: bool) -> Step {
        Step {
            prefix: "prefix".to_string(),
            next_actual_token: " tok".to_string(),
            predictions: if with_predictions {
                Predictions::Available(vec![(
                    "gpt2".to_string(),
                    ModelPredictions::Ranked(vec![Candidate {
                        token: " tok".to_string(),
                        probability: 0.5,
                    }]),
                )])
            } else {
                Predictions::Unavailable
            },
        }
    }

    fn sample(steps: &[bool]) -> Sample {
        Sample {
            article_title: None,
            steps: steps.iter().map(|p| step(*p)).collect(),
        }
    }

    fn datasets(sets: Vec<Option<Vec<Sample>>>) -> Datasets {
        Datasets::new(
            sets.into_iter()
                .enumerate()
                .map(|(i, data)| LoadedDataset {
                    title: format!("set {i}"),
                    data,
                })
                .collect(),
        )
    }

    fn at(sample: usize, step: usize, predictions: bool, answer: bool) -> NavState {
        NavState {
            cursor: Cursor {
                dataset: 0,
                sample,
                step,
            },
            reveal: Reveal {
                predictions,
                answer,
            },
        }
    }

    /// Every state reachable by pressing Forward from the start.
    fn walk(data: &Datasets) -> Vec<NavState> {
        let mut states = vec![NavState::default()];
        loop {
            let cur = *states.last().unwrap();
            let next = reduce(cur, Event::Forward, data);
            if next == cur {
                return states;
            }
            states.push(next);
        }
    }

    #[test]
    fn five_forwards_scenario() {
        let data = datasets(vec![Some(vec![sample(&[true, false])])]);
        let mut state = NavState::default();
        let mut seen = vec![state];
        for _ in 0..5 {
            state = reduce(state, Event::Forward, &data);
            seen.push(state);
        }
        assert_eq!(
            seen,
            vec![
                at(0, 0, false, false),
                at(0, 0, true, false),
                at(0, 0, true, true),
                at(0, 1, false, false),
                at(0, 1, false, true),
                at(0, 1, false, true),
            ]
        );
    }

    #[test]
    fn answer_only_step_never_shows_predictions() {
        let data = datasets(vec![Some(vec![sample(&[false, false])])]);
        let once = reduce(NavState::default(), Event::Forward, &data);
        assert_eq!(once, at(0, 0, false, true));
        let twice = reduce(once, Event::Forward, &data);
        assert_eq!(twice, at(0, 1, false, false));

        // Backward restores the collapsed phase.
        assert_eq!(reduce(once, Event::Backward, &data), at(0, 0, false, false));
        assert_eq!(reduce(twice, Event::Backward, &data), at(0, 0, false, true));
    }

    #[test]
    fn backward_clears_impossible_predictions_flag() {
        let data = datasets(vec![Some(vec![sample(&[false])])]);
        assert_eq!(
            reduce(at(0, 0, true, true), Event::Backward, &data),
            at(0, 0, false, false)
        );
    }

    #[test]
    fn forward_then_backward_is_identity() {
        let data = datasets(vec![Some(vec![
            sample(&[true, false, true]),
            sample(&[false]),
            sample(&[true, true]),
        ])]);
        let states = walk(&data);
        assert_eq!(states.len(), 3 + 2 + 3 + 2 + 3 + 3);

        for (i, state) in states.iter().enumerate() {
            let fwd = reduce(*state, Event::Forward, &data);
            if i + 1 == states.len() {
                assert_eq!(fwd, *state);
                assert!(is_forward_terminal(*state, &data));
            } else {
                assert_eq!(fwd, states[i + 1]);
                assert_eq!(reduce(fwd, Event::Backward, &data), *state);
                assert!(!is_forward_terminal(*state, &data));
            }

            let back = reduce(*state, Event::Backward, &data);
            if i == 0 {
                assert_eq!(back, *state);
                assert!(is_backward_terminal(*state, &data));
            } else {
                assert_eq!(back, states[i - 1]);
                assert_eq!(reduce(back, Event::Forward, &data), *state);
            }
        }
    }

    #[test]
    fn terminal_states_are_idempotent() {
        let data = datasets(vec![Some(vec![sample(&[true]), sample(&[true, false])])]);
        let end = at(1, 1, false, true);
        let mut state = end;
        for _ in 0..3 {
            state = reduce(state, Event::Forward, &data);
            assert_eq!(state, end);
        }

        let start = NavState::default();
        let mut state = start;
        for _ in 0..3 {
            state = reduce(state, Event::Backward, &data);
            assert_eq!(state, start);
        }
    }

    #[test]
    fn crossing_samples() {
        let data = datasets(vec![Some(vec![sample(&[true, true]), sample(&[false, true])])]);
        assert_eq!(
            reduce(at(0, 1, true, true), Event::Forward, &data),
            at(1, 0, false, false)
        );
        assert_eq!(
            reduce(at(1, 0, false, false), Event::Backward, &data),
            at(0, 1, true, true)
        );
    }

    #[test]
    fn empty_samples_are_skipped() {
        let data = datasets(vec![Some(vec![sample(&[false]), sample(&[]), sample(&[true])])]);
        assert_eq!(
            reduce(at(0, 0, false, true), Event::Forward, &data),
            at(2, 0, false, false)
        );
        assert_eq!(
            reduce(at(2, 0, false, false), Event::Backward, &data),
            at(0, 0, false, true)
        );
    }

    #[test]
    fn leading_empty_sample_is_skipped() {
        let data = datasets(vec![Some(vec![sample(&[]), sample(&[true])]), None]);
        let start = NavState::default();
        assert_eq!(reduce(start, Event::Forward, &data), at(1, 0, false, false));
        assert!(!is_forward_terminal(start, &data));
        assert!(needs_reset(start, &data));
        assert_eq!(reduce(start, Event::Reset, &data), at(1, 0, false, false));

        // Selecting the dataset lands on its first real step, which is the backward terminal.
        let away = NavState {
            cursor: Cursor { dataset: 1, sample: 0, step: 0 },
            reveal: Reveal::HIDDEN,
        };
        let back = reduce(away, Event::PrevDataset, &data);
        assert_eq!(back, at(1, 0, false, false));
        assert!(is_backward_terminal(back, &data));
        assert!(!needs_reset(back, &data));
    }

    #[test]
    fn change_dataset_always_resets() {
        let data = datasets(vec![
            Some(vec![sample(&[true, true])]),
            Some(vec![sample(&[true])]),
            None,
        ]);
        let deep = at(0, 1, true, true);

        let changed = reduce(deep, Event::ChangeDataset(2), &data);
        assert_eq!(changed.cursor, Cursor { dataset: 2, sample: 0, step: 0 });
        assert_eq!(changed.reveal, Reveal::HIDDEN);

        // Same index and out of range are no-ops.
        assert_eq!(reduce(deep, Event::ChangeDataset(0), &data), deep);
        assert_eq!(reduce(deep, Event::ChangeDataset(3), &data), deep);

        let next = reduce(deep, Event::NextDataset, &data);
        assert_eq!(next.cursor, Cursor { dataset: 1, sample: 0, step: 0 });
        assert_eq!(next.reveal, Reveal::HIDDEN);
        assert_eq!(reduce(next, Event::PrevDataset, &data), NavState::default());
        assert_eq!(reduce(NavState::default(), Event::PrevDataset, &data), NavState::default());
        assert_eq!(reduce(changed, Event::NextDataset, &data), changed);
    }

    #[test]
    fn unavailable_dataset_is_inert() {
        let data = datasets(vec![None, Some(vec![sample(&[true])])]);
        let start = NavState::default();
        assert_eq!(reduce(start, Event::Forward, &data), start);
        assert_eq!(reduce(start, Event::Backward, &data), start);
        assert!(is_forward_terminal(start, &data));
        assert!(!needs_reset(start, &data));
        assert_eq!(reduce(start, Event::NextDataset, &data).cursor.dataset, 1);
    }

    #[test]
    fn out_of_bounds_cursor_needs_reset() {
        let data = datasets(vec![Some(vec![sample(&[true])])]);
        let lost = at(3, 2, true, false);
        assert_eq!(reduce(lost, Event::Forward, &data), lost);
        assert!(needs_reset(lost, &data));
        assert!(needs_reset(at(0, 4, false, false), &data));
        assert!(!needs_reset(at(0, 0, true, false), &data));

        let fixed = reduce(lost, Event::Reset, &data);
        assert_eq!(fixed, NavState::default());
        assert!(!needs_reset(fixed, &data));
    }

    #[test]
    fn empty_dataset_does_not_need_reset() {
        let data = datasets(vec![Some(vec![])]);
        assert!(!needs_reset(NavState::default(), &data));
        assert!(is_forward_terminal(NavState::default(), &data));
    }
}
