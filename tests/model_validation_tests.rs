use chrono::{Duration, TimeZone, Utc};
use college_eval::{
    access_code::{
        ACCESS_CODE_LEN, access_code_expiry, days_left, generate_access_code,
        normalize_access_code,
    },
    models::{
        CreateJudgeRequest, Judge, LookupResult, MarkDetail, MarksStats, Student,
        SubmitMarksRequest, TeamMarkRequest,
    },
    report::{filter_totals, marks_stats, student_totals},
};
use serde_json::json;
use std::collections::HashSet;
use uuid::Uuid;

fn mark(student_id: Uuid, name: &str, roll: &str, marks: f64) -> MarkDetail {
    MarkDetail {
        id: Uuid::new_v4(),
        student_id,
        judge_id: Uuid::new_v4(),
        marks,
        student_name: name.to_string(),
        roll_no: roll.to_string(),
        group_no: "G1".to_string(),
        college_name: "Test College".to_string(),
        college_code: "TC".to_string(),
        judge_name: "Judge".to_string(),
        ..MarkDetail::default()
    }
}

// --- Access Codes ---

#[test]
fn test_access_code_shape() {
    let codes: HashSet<String> = (0..200).map(|_| generate_access_code()).collect();
    for code in &codes {
        assert_eq!(code.len(), ACCESS_CODE_LEN);
        assert!(code.chars().all(|c| c.is_ascii_uppercase() || c.is_ascii_digit()));
    }
    // 36^8 possibilities; 200 draws colliding would point at a broken generator.
    assert!(codes.len() > 190);
}

#[test]
fn test_access_code_expires_exactly_seven_days_after_issue() {
    let issued = Utc.with_ymd_and_hms(2025, 3, 1, 9, 30, 15).unwrap();
    let expiry = access_code_expiry(issued);
    assert_eq!(expiry, Utc.with_ymd_and_hms(2025, 3, 8, 9, 30, 15).unwrap());
    assert_eq!(expiry - issued, Duration::days(7));
}

#[test]
fn test_days_left_rounds_up() {
    let now = Utc.with_ymd_and_hms(2025, 3, 1, 12, 0, 0).unwrap();
    assert_eq!(days_left(now + Duration::days(7), now), 7);
    assert_eq!(days_left(now + Duration::hours(1), now), 1);
    assert_eq!(days_left(now + Duration::days(2) + Duration::minutes(1), now), 3);
    assert_eq!(days_left(now, now), 0);
    assert!(days_left(now - Duration::days(2), now) < 0);
}

#[test]
fn test_normalize_access_code() {
    assert_eq!(normalize_access_code("  ab12cd34\n"), "AB12CD34");
}

#[test]
fn test_judge_can_sign_in() {
    let now = Utc::now();
    let judge = Judge {
        is_active: true,
        access_code_expires_at: now + Duration::days(1),
        ..Judge::default()
    };
    assert!(judge.can_sign_in(now));
    assert!(judge.can_sign_in(now + Duration::days(1)));
    assert!(!judge.can_sign_in(now + Duration::days(1) + Duration::seconds(1)));

    let inactive = Judge {
        is_active: false,
        ..judge
    };
    assert!(!inactive.can_sign_in(now));
}

// --- Report ---

#[test]
fn test_student_totals_groups_in_first_seen_order() {
    let ada = Uuid::new_v4();
    let alan = Uuid::new_v4();
    let marks = vec![
        mark(alan, "Alan Turing", "CS002", 45.0),
        mark(ada, "Ada Lovelace", "CS001", 80.0),
        mark(alan, "Alan Turing", "CS002", 55.0),
        mark(ada, "Ada Lovelace", "CS001", 60.5),
    ];

    let totals = student_totals(&marks);
    assert_eq!(totals.len(), 2);

    assert_eq!(totals[0].student_id, alan);
    assert_eq!(totals[0].evaluations, 2);
    assert_eq!(totals[0].total, 100.0);
    assert_eq!(totals[0].average, 50.0);
    assert_eq!(totals[0].marks[0].marks, 45.0);

    assert_eq!(totals[1].student_id, ada);
    assert_eq!(totals[1].total, 140.5);
    assert_eq!(totals[1].average, 70.25);
}

#[test]
fn test_student_totals_empty() {
    assert!(student_totals(&[]).is_empty());
}

#[test]
fn test_filter_totals() {
    let marks = vec![
        mark(Uuid::new_v4(), "Ada Lovelace", "CS001", 1.0),
        mark(Uuid::new_v4(), "Alan Turing", "CS002", 2.0),
    ];
    let mut with_assigned = mark(Uuid::new_v4(), "Grace Hopper", "CS003", 3.0);
    with_assigned.assigned_roll_no = Some("R-77".to_string());
    let mut all = marks.clone();
    all.push(with_assigned);

    let totals = student_totals(&all);
    assert_eq!(filter_totals(totals.clone(), None).len(), 3);
    assert_eq!(filter_totals(totals.clone(), Some("   ")).len(), 3);
    assert_eq!(filter_totals(totals.clone(), Some("LOVE")).len(), 1);
    assert_eq!(filter_totals(totals.clone(), Some("cs00")).len(), 3);
    assert_eq!(filter_totals(totals.clone(), Some("r-77"))[0].student_name, "Grace Hopper");
    assert!(filter_totals(totals, Some("nobody")).is_empty());
}

#[test]
fn test_marks_stats() {
    let ada = Uuid::new_v4();
    let marks = vec![
        mark(ada, "Ada", "1", 10.0),
        mark(ada, "Ada", "1", 20.0),
        mark(Uuid::new_v4(), "Alan", "2", 30.0),
    ];
    assert_eq!(
        marks_stats(&marks, 4),
        MarksStats {
            total_evaluations: 7,
            individual_marks: 3,
            team_marks: 4,
            students_evaluated: 2,
        }
    );
}

// --- Wire Shapes ---

#[test]
fn test_request_payloads_use_camel_case() {
    let student_id = Uuid::new_v4();
    let req: SubmitMarksRequest =
        serde_json::from_value(json!({"studentId": student_id, "marks": 42})).unwrap();
    assert_eq!(req.student_id, Some(student_id));
    assert_eq!(req.marks, Some(42.0));
    assert!(req.comments.is_none());

    let college_id = Uuid::new_v4();
    let req: TeamMarkRequest = serde_json::from_value(
        json!({"collegeId": college_id, "groupNo": "A1", "marks": 9.5, "comments": "ok"}),
    )
    .unwrap();
    assert_eq!(req.college_id, Some(college_id));
    assert_eq!(req.group_no.as_deref(), Some("A1"));

    let req: CreateJudgeRequest = serde_json::from_value(json!({"name": "J"})).unwrap();
    assert!(req.college_id.is_none());
}

#[test]
fn test_lookup_result_serialization() {
    let student = Student {
        name: "Ada".to_string(),
        roll_no: "CS001".to_string(),
        group_no: "A1".to_string(),
        college_name: "Test College".to_string(),
        qr_code_data: "secret-payload".to_string(),
        ..Student::default()
    };

    let found = serde_json::to_value(LookupResult::found(student)).unwrap();
    assert_eq!(found["success"], true);
    assert_eq!(found["student"]["college_name"], "Test College");
    assert!(found.get("error").is_none());
    // The QR payload is not echoed back to the scanner.
    assert!(found["student"].get("qr_code_data").is_none());

    let missing = serde_json::to_value(LookupResult::missing("Student not found")).unwrap();
    assert_eq!(missing, json!({"success": false, "error": "Student not found"}));
}
