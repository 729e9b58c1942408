use std::collections::{HashMap, HashSet};

use uuid::Uuid;

use crate::models::{MarkDetail, MarksStats, StudentTotal};

/// student_totals
///
/// Groups individual marks by student. Students appear in the order their first mark
/// appears in `marks` (the repository returns marks newest first), and each student's
/// marks keep their input order.
pub fn student_totals(marks: &[MarkDetail]) -> Vec<StudentTotal> {
    let mut index: HashMap<Uuid, usize> = HashMap::new();
    let mut totals: Vec<StudentTotal> = Vec::new();

    for mark in marks {
        let slot = *index.entry(mark.student_id).or_insert_with(|| {
            totals.push(StudentTotal {
                student_id: mark.student_id,
                student_name: mark.student_name.clone(),
                roll_no: mark.roll_no.clone(),
                assigned_roll_no: mark.assigned_roll_no.clone(),
                group_no: mark.group_no.clone(),
                college_name: mark.college_name.clone(),
                ..StudentTotal::default()
            });
            totals.len() - 1
        });

        let entry = &mut totals[slot];
        entry.evaluations += 1;
        entry.total += mark.marks;
        entry.marks.push(mark.clone());
    }

    for entry in &mut totals {
        entry.average = if entry.evaluations == 0 {
            0.0
        } else {
            entry.total / f64::from(entry.evaluations)
        };
    }

    totals
}

/// filter_totals
///
/// Case-insensitive substring match on name, roll number or assigned roll number.
/// A blank search keeps everything.
pub fn filter_totals(totals: Vec<StudentTotal>, search: Option<&str>) -> Vec<StudentTotal> {
    let needle = match search.map(str::trim) {
        Some(s) if !s.is_empty() => s.to_lowercase(),
        _ => return totals,
    };

    totals
        .into_iter()
        .filter(|t| {
            t.student_name.to_lowercase().contains(&needle)
                || t.roll_no.to_lowercase().contains(&needle)
                || t.assigned_roll_no
                    .as_deref()
                    .is_some_and(|a| a.to_lowercase().contains(&needle))
        })
        .collect()
}

/// Counts derived from already-loaded mark rows.
pub fn marks_stats(marks: &[MarkDetail], team_marks: usize) -> MarksStats {
    let individual = marks.len() as i64;
    let team = team_marks as i64;
    let students: HashSet<Uuid> = marks.iter().map(|m| m.student_id).collect();

    MarksStats {
        total_evaluations: individual + team,
        individual_marks: individual,
        team_marks: team,
        students_evaluated: students.len() as i64,
    }
}
