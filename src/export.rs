use std::io::Cursor;

use calamine::{Data, Range, Reader, Xlsx, open_workbook_from_rs};
use chrono::NaiveDate;
use rust_xlsxwriter::{Format, Workbook, Worksheet, XlsxError};
use serde::Deserialize;
use thiserror::Error;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::{
    models::{College, MarkDetail, NewStudent, StudentTotal},
    report,
};

pub const XLSX_CONTENT_TYPE: &str =
    "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet";

pub const MARKS_SHEET: &str = "Student Evaluations";
pub const TOTALS_SHEET: &str = "Student Totals";

const NOT_AVAILABLE: &str = "N/A";

// (header, column width)
const MARK_COLUMNS: [(&str, f64); 9] = [
    ("Student Name", 20.0),
    ("Roll Number", 15.0),
    ("Assigned Roll Number", 20.0),
    ("Group Number", 15.0),
    ("College", 25.0),
    ("Judge Name", 20.0),
    ("Marks", 10.0),
    ("Comments", 30.0),
    ("Evaluated At", 22.0),
];

const TOTAL_COLUMNS: [(&str, f64); 8] = [
    ("Student Name", 20.0),
    ("Roll Number", 15.0),
    ("Assigned Roll Number", 20.0),
    ("Group Number", 15.0),
    ("College", 25.0),
    ("Evaluations", 12.0),
    ("Total", 10.0),
    ("Average", 10.0),
];

const TEMPLATE_COLUMNS: [(&str, f64); 4] = [
    ("No of students", 15.0),
    ("Roll No.", 15.0),
    ("Name", 25.0),
    ("Group No.", 15.0),
];

/// ExportView
///
/// `marks` writes one row per individual mark, `students` one row per student total.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum ExportView {
    #[default]
    Marks,
    Students,
}

/// evaluations_workbook
///
/// Renders the admin evaluation export. The `students` view is built from
/// `report::student_totals`, the same aggregation the evaluations endpoint returns.
pub fn evaluations_workbook(marks: &[MarkDetail], view: ExportView) -> Result<Vec<u8>, XlsxError> {
    let mut workbook = Workbook::new();
    let header = Format::new().set_bold();
    let sheet = workbook.add_worksheet();

    match view {
        ExportView::Marks => {
            sheet.set_name(MARKS_SHEET)?;
            write_header(sheet, &MARK_COLUMNS, &header)?;
            for (i, mark) in marks.iter().enumerate() {
                write_mark_row(sheet, i as u32 + 1, mark)?;
            }
        }
        ExportView::Students => {
            sheet.set_name(TOTALS_SHEET)?;
            write_header(sheet, &TOTAL_COLUMNS, &header)?;
            for (i, total) in report::student_totals(marks).iter().enumerate() {
                write_total_row(sheet, i as u32 + 1, total)?;
            }
        }
    }

    workbook.save_to_buffer()
}

fn write_mark_row(sheet: &mut Worksheet, row: u32, mark: &MarkDetail) -> Result<(), XlsxError> {
    sheet.write_string(row, 0, or_na(&mark.student_name))?;
    sheet.write_string(row, 1, or_na(&mark.roll_no))?;
    sheet.write_string(row, 2, mark.assigned_roll_no.as_deref().map_or(NOT_AVAILABLE, or_na))?;
    sheet.write_string(row, 3, or_na(&mark.group_no))?;
    sheet.write_string(row, 4, or_na(&mark.college_name))?;
    sheet.write_string(row, 5, or_na(&mark.judge_name))?;
    sheet.write_number(row, 6, mark.marks)?;
    sheet.write_string(row, 7, mark.comments.as_deref().unwrap_or(""))?;
    sheet.write_string(
        row,
        8,
        mark.created_at.format("%Y-%m-%d %H:%M:%S UTC").to_string(),
    )?;
    Ok(())
}

fn write_total_row(sheet: &mut Worksheet, row: u32, total: &StudentTotal) -> Result<(), XlsxError> {
    sheet.write_string(row, 0, or_na(&total.student_name))?;
    sheet.write_string(row, 1, or_na(&total.roll_no))?;
    sheet.write_string(row, 2, total.assigned_roll_no.as_deref().map_or(NOT_AVAILABLE, or_na))?;
    sheet.write_string(row, 3, or_na(&total.group_no))?;
    sheet.write_string(row, 4, or_na(&total.college_name))?;
    sheet.write_number(row, 5, f64::from(total.evaluations))?;
    sheet.write_number(row, 6, total.total)?;
    sheet.write_number(row, 7, total.average)?;
    Ok(())
}

fn write_header(
    sheet: &mut Worksheet,
    columns: &[(&str, f64)],
    format: &Format,
) -> Result<(), XlsxError> {
    for (col, (title, width)) in columns.iter().enumerate() {
        let col = col as u16;
        sheet.write_string_with_format(0, col, *title, format)?;
        sheet.set_column_width(col, *width)?;
    }
    Ok(())
}

fn or_na(value: &str) -> &str {
    if value.trim().is_empty() { NOT_AVAILABLE } else { value }
}

/// `Student_Evaluations_<date>.xlsx`, or `<CODE>_Evaluations_<date>.xlsx` for one college.
pub fn evaluations_filename(college_code: Option<&str>, date: NaiveDate) -> String {
    match college_code {
        Some(code) => format!("{}_Evaluations_{}.xlsx", code, date.format("%Y-%m-%d")),
        None => format!("Student_Evaluations_{}.xlsx", date.format("%Y-%m-%d")),
    }
}

// --- Student Template & Upload ---

/// student_template
///
/// The upload template handed to admins: header row, three sample rows and
/// instructions, on a sheet named after the college code.
pub fn student_template(college: &College) -> Result<Vec<u8>, XlsxError> {
    let mut workbook = Workbook::new();
    let header = Format::new().set_bold();
    let sheet = workbook.add_worksheet();
    sheet.set_name(template_sheet_name(&college.code))?;
    write_header(sheet, &TEMPLATE_COLUMNS, &header)?;

    let rows: [[&str; 4]; 10] = [
        ["1", "CS001", "John Doe", "A1"],
        ["2", "CS002", "Jane Smith", "A1"],
        ["3", "CS003", "Bob Johnson", "B2"],
        ["", "", "", ""],
        ["Instructions:", "", "", ""],
        ["1. Fill student data starting from row 2", "", "", ""],
        ["2. No of students: Sequential number", "", "", ""],
        ["3. Roll No.: Unique student roll number", "", "", ""],
        ["4. Name: Full student name", "", "", ""],
        ["5. Group No.: Team/group identifier", "", "", ""],
    ];
    for (r, cells) in rows.iter().enumerate() {
        for (c, value) in cells.iter().enumerate() {
            if !value.is_empty() {
                sheet.write_string(r as u32 + 1, c as u16, *value)?;
            }
        }
    }

    workbook.save_to_buffer()
}

pub fn template_filename(college: &College) -> String {
    format!("{}_Student_Template.xlsx", college.code)
}

/// Sheet names are capped at 31 characters and may not contain `[]:*?/\`.
fn template_sheet_name(code: &str) -> String {
    let cleaned: String = format!("{code}_Students")
        .chars()
        .map(|c| if "[]:*?/\\".contains(c) { '_' } else { c })
        .collect();
    cleaned.chars().take(31).collect()
}

/// UploadError
///
/// Reasons an uploaded student sheet is refused. The messages are shown to the admin.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum UploadError {
    #[error("Failed to process Excel file. Please check the format.")]
    Unreadable,
    #[error("Excel file must contain at least one student record")]
    TooFewRows,
    #[error("No valid student records found in the file")]
    NoValidRows,
}

/// parse_student_upload
///
/// Reads the first sheet of an uploaded workbook laid out like `student_template`.
/// The first row is a header; rows missing a roll number, name or group are skipped
/// (which also drops the template's instruction lines).
pub fn parse_student_upload(
    bytes: &[u8],
    college_id: Uuid,
    uploaded_at_ms: i64,
) -> Result<Vec<NewStudent>, UploadError> {
    let mut workbook: Xlsx<_> =
        open_workbook_from_rs(Cursor::new(bytes)).map_err(|_| UploadError::Unreadable)?;
    let range = workbook
        .worksheet_range_at(0)
        .ok_or(UploadError::Unreadable)?
        .map_err(|_| UploadError::Unreadable)?;

    let (Some((start_row, _)), Some((end_row, _))) = (range.start(), range.end()) else {
        return Err(UploadError::TooFewRows);
    };
    if end_row <= start_row {
        return Err(UploadError::TooFewRows);
    }

    let students: Vec<NewStudent> = (start_row + 1..=end_row)
        .filter_map(|row| {
            let roll_no = cell_text(&range, row, 1)?;
            let name = cell_text(&range, row, 2)?;
            let group_no = cell_text(&range, row, 3)?;
            Some(NewStudent {
                college_id,
                qr_code_data: format!("{college_id}-{roll_no}-{uploaded_at_ms}"),
                roll_no,
                name,
                group_no,
            })
        })
        .collect();

    if students.is_empty() {
        return Err(UploadError::NoValidRows);
    }
    Ok(students)
}

fn cell_text(range: &Range<Data>, row: u32, col: u32) -> Option<String> {
    let text = match range.get_value((row, col))? {
        Data::String(s) => s.trim().to_string(),
        Data::Int(i) => i.to_string(),
        Data::Float(f) if f.fract() == 0.0 => format!("{}", *f as i64),
        Data::Float(f) => f.to_string(),
        Data::Bool(b) => b.to_string(),
        _ => return None,
    };
    (!text.is_empty()).then_some(text)
}
