use calamine::{Data, Reader, Xlsx, open_workbook_from_rs};
use chrono::{NaiveDate, TimeZone, Utc};
use college_eval::{
    export::{
        ExportView, MARKS_SHEET, TOTALS_SHEET, UploadError, evaluations_filename,
        evaluations_workbook, parse_student_upload, student_template, template_filename,
    },
    models::{College, MarkDetail, Student},
    qr::{escape_html, mass_qr_filename, mass_qr_html, student_qr_filename, student_qr_svg},
    report::student_totals,
};
use rust_xlsxwriter::Workbook;
use std::io::Cursor;
use uuid::Uuid;

// --- Helpers ---

fn read_sheet(bytes: Vec<u8>) -> (String, Vec<Vec<Data>>) {
    let mut workbook: Xlsx<_> = open_workbook_from_rs(Cursor::new(bytes)).unwrap();
    let name = workbook.sheet_names()[0].clone();
    let range = workbook.worksheet_range(&name).unwrap();
    let rows = range.rows().map(|r| r.to_vec()).collect();
    (name, rows)
}

fn text(cell: &Data) -> String {
    match cell {
        Data::String(s) => s.clone(),
        Data::Float(f) => f.to_string(),
        Data::Int(i) => i.to_string(),
        Data::Empty => String::new(),
        other => format!("{other:?}"),
    }
}

fn number(cell: &Data) -> f64 {
    match cell {
        Data::Float(f) => *f,
        Data::Int(i) => *i as f64,
        other => panic!("expected a number, got {other:?}"),
    }
}

fn sample_marks() -> Vec<MarkDetail> {
    let ada = Uuid::new_v4();
    let alan = Uuid::new_v4();
    let at = Utc.with_ymd_and_hms(2025, 3, 1, 10, 0, 0).unwrap();
    let base = |student_id, name: &str, roll: &str, marks, judge: &str| MarkDetail {
        id: Uuid::new_v4(),
        student_id,
        judge_id: Uuid::new_v4(),
        marks,
        created_at: at,
        student_name: name.to_string(),
        roll_no: roll.to_string(),
        group_no: "A1".to_string(),
        college_name: "Springfield Tech".to_string(),
        college_code: "SPT".to_string(),
        judge_name: judge.to_string(),
        ..MarkDetail::default()
    };

    let mut first = base(ada, "Ada Lovelace", "CS001", 80.0, "Judge One");
    first.comments = Some("great".to_string());
    first.assigned_roll_no = Some("R-1".to_string());
    vec![
        first,
        base(alan, "Alan Turing", "CS002", 45.0, "Judge One"),
        base(ada, "Ada Lovelace", "CS001", 60.0, "Judge Two"),
    ]
}

fn college() -> College {
    College {
        id: Uuid::new_v4(),
        name: "Springfield Tech".to_string(),
        code: "SPT".to_string(),
        ..College::default()
    }
}

// --- Evaluation Export ---

#[test]
fn test_marks_view_has_one_row_per_mark() {
    let marks = sample_marks();
    let (sheet, rows) = read_sheet(evaluations_workbook(&marks, ExportView::Marks).unwrap());

    assert_eq!(sheet, MARKS_SHEET);
    assert_eq!(rows.len(), marks.len() + 1);
    let header: Vec<String> = rows[0].iter().map(text).collect();
    assert_eq!(
        header,
        [
            "Student Name", "Roll Number", "Assigned Roll Number", "Group Number", "College",
            "Judge Name", "Marks", "Comments", "Evaluated At"
        ]
    );

    assert_eq!(text(&rows[1][0]), "Ada Lovelace");
    assert_eq!(text(&rows[1][2]), "R-1");
    assert_eq!(number(&rows[1][6]), 80.0);
    assert_eq!(text(&rows[1][7]), "great");
    assert_eq!(text(&rows[1][8]), "2025-03-01 10:00:00 UTC");
    // Missing assigned roll number is written as N/A.
    assert_eq!(text(&rows[2][2]), "N/A");
}

#[test]
fn test_students_view_matches_student_totals() {
    let marks = sample_marks();
    let totals = student_totals(&marks);
    let (sheet, rows) = read_sheet(evaluations_workbook(&marks, ExportView::Students).unwrap());

    assert_eq!(sheet, TOTALS_SHEET);
    assert_eq!(rows.len(), totals.len() + 1);
    assert_eq!(text(&rows[0][6]), "Total");

    for (row, total) in rows[1..].iter().zip(&totals) {
        assert_eq!(text(&row[1]), total.roll_no);
        assert_eq!(number(&row[5]), f64::from(total.evaluations));
        assert_eq!(number(&row[6]), total.total);
        assert_eq!(number(&row[7]), total.average);
    }
    assert_eq!(number(&rows[1][6]), 140.0);
}

#[test]
fn test_empty_export_still_has_header() {
    let (_, rows) = read_sheet(evaluations_workbook(&[], ExportView::Marks).unwrap());
    assert_eq!(rows.len(), 1);
}

#[test]
fn test_export_filenames() {
    let date = NaiveDate::from_ymd_opt(2025, 3, 1).unwrap();
    assert_eq!(evaluations_filename(None, date), "Student_Evaluations_2025-03-01.xlsx");
    assert_eq!(evaluations_filename(Some("SPT"), date), "SPT_Evaluations_2025-03-01.xlsx");
    assert_eq!(template_filename(&college()), "SPT_Student_Template.xlsx");
}

// --- Template & Upload ---

#[test]
fn test_template_parses_back_into_sample_students() {
    let college = college();
    let bytes = student_template(&college).unwrap();

    let (sheet, rows) = read_sheet(bytes.clone());
    assert_eq!(sheet, "SPT_Students");
    let header: Vec<String> = rows[0].iter().map(text).collect();
    assert_eq!(header, ["No of students", "Roll No.", "Name", "Group No."]);

    // Instruction lines lack roll/name/group and are skipped.
    let students = parse_student_upload(&bytes, college.id, 1_700_000_000_000).unwrap();
    let rolls: Vec<&str> = students.iter().map(|s| s.roll_no.as_str()).collect();
    assert_eq!(rolls, ["CS001", "CS002", "CS003"]);
    assert_eq!(students[2].group_no, "B2");
    assert_eq!(
        students[0].qr_code_data,
        format!("{}-CS001-1700000000000", college.id)
    );
}

#[test]
fn test_upload_reads_numeric_cells_and_skips_incomplete_rows() {
    let mut workbook = Workbook::new();
    let sheet = workbook.add_worksheet();
    for (col, title) in ["No", "Roll No.", "Name", "Group No."].iter().enumerate() {
        sheet.write_string(0, col as u16, *title).unwrap();
    }
    sheet.write_number(1, 0, 1).unwrap();
    sheet.write_number(1, 1, 1001).unwrap();
    sheet.write_string(1, 2, "  Ada  ").unwrap();
    sheet.write_number(1, 3, 7).unwrap();
    // Missing name.
    sheet.write_string(2, 1, "1002").unwrap();
    sheet.write_string(2, 3, "7").unwrap();
    let bytes = workbook.save_to_buffer().unwrap();

    let students = parse_student_upload(&bytes, Uuid::new_v4(), 0).unwrap();
    assert_eq!(students.len(), 1);
    assert_eq!(students[0].roll_no, "1001");
    assert_eq!(students[0].name, "Ada");
    assert_eq!(students[0].group_no, "7");
}

#[test]
fn test_upload_errors() {
    assert_eq!(
        parse_student_upload(b"not a workbook", Uuid::new_v4(), 0),
        Err(UploadError::Unreadable)
    );

    let mut header_only = Workbook::new();
    header_only.add_worksheet().write_string(0, 0, "Roll No.").unwrap();
    assert_eq!(
        parse_student_upload(&header_only.save_to_buffer().unwrap(), Uuid::new_v4(), 0),
        Err(UploadError::TooFewRows)
    );

    let mut no_valid = Workbook::new();
    let sheet = no_valid.add_worksheet();
    sheet.write_string(0, 1, "Roll No.").unwrap();
    sheet.write_string(1, 0, "Instructions:").unwrap();
    assert_eq!(
        parse_student_upload(&no_valid.save_to_buffer().unwrap(), Uuid::new_v4(), 0),
        Err(UploadError::NoValidRows)
    );
    assert_eq!(
        UploadError::NoValidRows.to_string(),
        "No valid student records found in the file"
    );
}

// --- QR Codes ---

fn student(roll: &str, name: &str) -> Student {
    Student {
        id: Uuid::new_v4(),
        roll_no: roll.to_string(),
        name: name.to_string(),
        group_no: "A1".to_string(),
        qr_code_data: format!("college-{roll}-1"),
        college_name: "Springfield Tech".to_string(),
        college_code: "SPT".to_string(),
        ..Student::default()
    }
}

#[test]
fn test_student_qr_svg_and_filename() {
    let student = student("CS001", "Ada  King Lovelace");
    let svg = student_qr_svg(&student).unwrap();
    assert!(svg.contains("<svg"));
    assert_eq!(student_qr_filename(&student), "SPT_CS001_Ada_King_Lovelace_QR.svg");
}

#[test]
fn test_mass_qr_sheets_of_eight() {
    let students: Vec<Student> = (1..=9)
        .map(|i| student(&format!("CS{i:03}"), &format!("Student {i}")))
        .collect();
    let html = mass_qr_html("Springfield <Tech>", "SPT", &students).unwrap();

    assert!(html.contains("Springfield &lt;Tech&gt; (SPT)"));
    assert!(html.contains("Student QR Codes - Sheet 1"));
    assert!(html.contains("Student QR Codes - Sheet 2"));
    assert!(!html.contains("Sheet 3"));
    assert_eq!(html.matches("class=\"qr-item\"").count(), 9);
    // Inline SVGs carry no XML prolog.
    assert!(!html.contains("<?xml"));
    assert_eq!(mass_qr_filename("SPT"), "SPT_All_QR_Codes.html");
}

#[test]
fn test_escape_html() {
    assert_eq!(escape_html(r#"<a href="x">&'"#), "&lt;a href=&quot;x&quot;&gt;&amp;&#39;");
}
