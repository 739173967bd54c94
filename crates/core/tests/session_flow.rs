use std::sync::Arc;

use rehab_motion_core::{
    decode_client_message, encode_server_message, ClientMessage, ExerciseState, ExerciseType,
    InMemoryStore, Landmark, ManualClock, PoseLandmark, ServerMessage, SessionManager,
    SessionStore, Severity, Skeleton,
};

#[derive(Clone, Copy)]
enum Arms {
    Down,
    Up,
    UpBent,
}

fn arm_pose(arms: Arms) -> Skeleton {
    use PoseLandmark::*;

    let (elbow, wrist) = match arms {
        Arms::Down => ((0.5, 0.7), (0.5, 0.9)),
        Arms::Up => ((0.5, 0.3), (0.5, 0.1)),
        Arms::UpBent => ((0.5, 0.3), (0.7, 0.3)),
    };

    let mut skeleton = Skeleton::default();
    for (hip, shoulder, elbow_id, wrist_id) in [
        (LeftHip, LeftShoulder, LeftElbow, LeftWrist),
        (RightHip, RightShoulder, RightElbow, RightWrist),
    ] {
        skeleton.set(hip, Landmark::new(0.5, 0.8));
        skeleton.set(shoulder, Landmark::new(0.5, 0.5));
        skeleton.set(elbow_id, Landmark::new(elbow.0, elbow.1));
        skeleton.set(wrist_id, Landmark::new(wrist.0, wrist.1));
    }
    skeleton
}

#[test]
fn arm_raise_session_counts_reps_and_debounces_errors() {
    let clock = ManualClock::starting_at(100.0);
    let manager = SessionManager::new(Arc::new(InMemoryStore::new()), Arc::new(clock.clone()));
    let id = manager.begin(42, "arm_raise").unwrap();

    let script = [
        (0.0, Arms::Down),
        (0.5, Arms::Up),
        (1.0, Arms::Down),
        (2.0, Arms::UpBent),
        (2.6, Arms::UpBent),
        (3.2, Arms::UpBent),
        (4.0, Arms::Down),
        (4.5, Arms::Down),
    ];

    let mut replies = Vec::new();
    for (timestamp, arms) in script {
        let analysis = manager
            .process_frame(id, &arm_pose(arms), timestamp)
            .unwrap()
            .expect("session is active");
        replies.push(analysis);
    }

    assert_eq!(replies[1].state(), Some(ExerciseState::Up));
    assert_eq!(replies[2].rep_count(), Some(1));
    assert!(replies[4].errors().is_empty(), "still inside the debounce window");
    assert_eq!(replies[5].errors().len(), 1);
    assert_eq!(replies[5].errors()[0].name, "Arm not straight");
    assert_eq!(replies[6].rep_count(), Some(2));

    clock.advance(45.4);
    let summary = manager.finalize(id).unwrap().unwrap();
    assert_eq!(summary.total_reps, 2);
    assert_eq!(summary.frame_count, 8);
    assert_eq!(summary.accuracy, 87.5);
    assert_eq!(summary.correct_reps, 1);
    assert_eq!(summary.duration_seconds, 45);
    assert_eq!(summary.common_errors.len(), 1);
    assert_eq!(summary.common_errors[0].severity, Severity::Medium);

    let store = manager.store();
    let history = store.history(42, 5).unwrap();
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].exercise, ExerciseType::ArmRaise);
    assert!(history[0].ended_at.is_some());
    assert_eq!(store.errors(id).unwrap()[0].count, 1);
}

#[test]
fn wire_messages_drive_a_session() {
    let manager = SessionManager::new(
        Arc::new(InMemoryStore::new()),
        Arc::new(ManualClock::new()),
    );
    let id = manager.begin(1, "arm_raise").unwrap();

    let frame = |timestamp: f64, arms: Arms| {
        serde_json::json!({
            "type": "frame",
            "timestamp": timestamp,
            "landmarks": arm_pose(arms).to_entries(),
        })
        .to_string()
    };

    let mut lines = vec![
        frame(0.0, Arms::Down),
        frame(0.5, Arms::Up),
        r#"{"type":"reset"}"#.to_string(),
        frame(1.0, Arms::Down),
        r#"{"type":"frame","timestamp":1.5}"#.to_string(),
    ];
    lines.insert(1, "garbage".to_string());

    let mut encoded = Vec::new();
    for line in &lines {
        let Ok(message) = decode_client_message(line) else {
            continue;
        };
        if let Some(reply) = manager.handle_message(id, message).unwrap() {
            encoded.push(encode_server_message(&reply).unwrap());
        }
    }

    assert_eq!(encoded.len(), 5);
    assert_eq!(encoded[2], r#"{"type":"reset_confirmed"}"#);

    let after_reset: serde_json::Value = serde_json::from_str(&encoded[3]).unwrap();
    assert_eq!(after_reset["type"], "analysis");
    assert_eq!(after_reset["pose_detected"], true);
    assert_eq!(after_reset["rep_count"], 0);
    assert_eq!(after_reset["state"], "down");

    let no_pose: serde_json::Value = serde_json::from_str(&encoded[4]).unwrap();
    assert_eq!(no_pose, serde_json::json!({ "type": "analysis", "pose_detected": false }));

    assert_eq!(
        manager.handle_message(id, ClientMessage::Reset).unwrap(),
        Some(ServerMessage::ResetConfirmed)
    );
    assert_eq!(manager.finalize(id).unwrap().unwrap().frame_count, 3);
}
