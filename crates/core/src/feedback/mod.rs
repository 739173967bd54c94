use crate::{ErrorRecord, ExerciseState, Side};

/// Picks the single feedback line shown for a frame: the first reported
/// posture error if there is one, otherwise an encouragement for the
/// current phase.
pub fn feedback_for(
    errors: &[ErrorRecord],
    state: ExerciseState,
    side: Option<Side>,
    hold_time_remaining: Option<f64>,
) -> String {
    match errors.first() {
        Some(error) => error.message.clone(),
        None => encouragement(state, side, hold_time_remaining),
    }
}

/// Per-state encouragement catalog.
pub fn encouragement(
    state: ExerciseState,
    side: Option<Side>,
    hold_time_remaining: Option<f64>,
) -> String {
    match state {
        ExerciseState::Down => "Ready!".to_string(),
        ExerciseState::Raising => "Raising...".to_string(),
        ExerciseState::Up => "Hold it!".to_string(),
        ExerciseState::Lowering if side.is_some() => "Lower your leg slowly...".to_string(),
        ExerciseState::Lowering => "Lowering...".to_string(),
        ExerciseState::Ready => {
            let side = side.unwrap_or(Side::Left);
            format!("Ready - lift your {} knee", side.as_str())
        }
        ExerciseState::Lifting => "Lifting your knee...".to_string(),
        ExerciseState::Holding => match hold_time_remaining {
            Some(remaining) if remaining > 0.0 => {
                format!("Hold steady! {}s left", remaining.trunc() as u64)
            }
            _ => "Hold steady!".to_string(),
        },
        ExerciseState::SwitchSide => "Great job! Switch sides".to_string(),
        ExerciseState::Complete => "Rep complete!".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::PostureError;

    #[test]
    fn first_error_wins() {
        let errors = vec![
            PostureError::ShoulderAngleLow.record(),
            PostureError::ElbowBent.record(),
        ];
        let line = feedback_for(&errors, ExerciseState::Up, None, None);
        assert_eq!(line, "Raise your arms higher!");
    }

    #[test]
    fn generic_family_catalog() {
        assert_eq!(encouragement(ExerciseState::Down, None, None), "Ready!");
        assert_eq!(encouragement(ExerciseState::Lowering, None, None), "Lowering...");
    }

    #[test]
    fn single_leg_catalog_mentions_side_and_countdown() {
        assert_eq!(
            encouragement(ExerciseState::Ready, Some(Side::Right), None),
            "Ready - lift your right knee"
        );
        assert_eq!(
            encouragement(ExerciseState::Holding, Some(Side::Left), Some(6.8)),
            "Hold steady! 6s left"
        );
        assert_eq!(
            encouragement(ExerciseState::Holding, Some(Side::Left), Some(0.0)),
            "Hold steady!"
        );
        assert_eq!(
            encouragement(ExerciseState::Lowering, Some(Side::Left), None),
            "Lower your leg slowly..."
        );
    }
}
