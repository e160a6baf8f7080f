#![allow(dead_code)]

use chrono::{TimeZone, Utc};
use dth_merge_core::contract::{RemoteFile, XLSX_MIME};
use rust_xlsxwriter::Workbook;
use std::path::{Path, PathBuf};

/// A cell in a generated fixture.
#[derive(Clone, Copy)]
pub enum Cell {
    S(&'static str),
    N(f64),
    Blank,
}

/// Write a workbook shaped like the monthly exports: a three-row banner, a
/// blank spacer row, the header on row 5 and data below it.
pub fn write_dth_fixture(path: &Path, headers: &[&str], rows: &[Vec<Cell>]) {
    let mut workbook = Workbook::new();
    let sheet = workbook.add_worksheet();
    sheet.write_string(0, 0, "DAFTAR TRANSAKSI HARIAN").unwrap();
    sheet.write_string(1, 0, "Periode: Maret 2024").unwrap();
    sheet.write_string(2, 0, "Satker: 123456").unwrap();

    for (c, header) in headers.iter().enumerate() {
        sheet.write_string(4, c as u16, *header).unwrap();
    }
    for (r, cells) in rows.iter().enumerate() {
        let r = (r + 5) as u32;
        for (c, cell) in cells.iter().enumerate() {
            let c = c as u16;
            match cell {
                Cell::S(s) => {
                    sheet.write_string(r, c, *s).unwrap();
                }
                Cell::N(n) => {
                    sheet.write_number(r, c, *n).unwrap();
                }
                Cell::Blank => {}
            }
        }
    }
    workbook.save(path).unwrap();
}

/// A file that is not a spreadsheet at all, named like one.
pub fn write_corrupt_fixture(path: &Path) {
    std::fs::write(path, b"this is not a workbook").unwrap();
}

pub fn remote(id: &str, name: &str, day: u32) -> RemoteFile {
    RemoteFile {
        id: id.to_string(),
        name: name.to_string(),
        created_time: Utc.with_ymd_and_hms(2024, 3, day, 9, 0, 0).unwrap(),
        mime_type: Some(XLSX_MIME.to_string()),
    }
}

/// Copy the fixture registered for `file.id` into `dest_dir`, the way a real
/// download would land it.
pub fn fake_download(
    fixtures: &[(String, PathBuf)],
    file: &RemoteFile,
    dest_dir: &Path,
) -> Result<PathBuf, Box<dyn std::error::Error + Send + Sync>> {
    let (_, fixture) = fixtures
        .iter()
        .find(|(id, _)| id == &file.id)
        .ok_or_else(|| format!("no fixture for {}", file.id))?;
    let target = dest_dir.join(&file.name);
    std::fs::copy(fixture, &target)?;
    Ok(target)
}
