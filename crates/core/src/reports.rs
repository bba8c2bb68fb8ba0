//! Report exports: at most one current file per entity and format.

use crate::index::{FileIndex, NewStoredFile, StoredFile};
use crate::service::FileService;
use crate::{IngestError, IngestResult};
use pfs_files::Bucket;
use pfs_types::{EntityId, Modality, NonEmptyText, ReportFormat};
use std::io::Read;

impl<I: FileIndex> FileService<I> {
    /// Stores a freshly generated report, replacing any earlier export of the same
    /// format for `entity`.
    ///
    /// The report is spooled first, so a failing generator leaves the previous export
    /// in place. Prior exports are then deleted before the new file takes its canonical
    /// name, which always carries the format's extension.
    pub fn replace_report_export<R: Read>(
        &self,
        entity: EntityId,
        format: ReportFormat,
        display_name: &str,
        reader: R,
    ) -> IngestResult<StoredFile> {
        let display_name = NonEmptyText::new(display_name)
            .map_err(|_| IngestError::InvalidInput("report name cannot be empty".into()))?;
        let bucket = Bucket::new(Modality::ReportExport, entity);

        let spooled = self.store().spool(&bucket, reader)?;

        let prior = self.index().reports(entity, format)?;
        for row in &prior {
            self.discard_row(row)?;
        }
        if !prior.is_empty() {
            tracing::debug!(entity = %entity, format = %format, replaced = prior.len(), "replaced report export");
        }

        let extension = format!(".{}", format.extension());
        let blob = self.store().commit(spooled, Some(&extension))?;
        self.record(
            NewStoredFile::new(bucket, display_name.as_str(), blob).with_report_format(format),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::service::test_support::{listing, service};
    use std::io::{self, Cursor};

    const ENTITY: EntityId = EntityId::new(8);

    #[test]
    fn export_is_stored_with_format_extension() {
        let (_temp, service) = service();
        let row = service
            .replace_report_export(ENTITY, ReportFormat::Word, "Patient summary", Cursor::new(b"docx"))
            .unwrap();

        assert_eq!(row.bucket, "info/8");
        assert!(row.canonical_name.ends_with(".docx"));
        assert_eq!(row.report_format, Some(ReportFormat::Word));

        let resolved = service.resolve_path(Modality::ReportExport, row.id).unwrap();
        assert!(resolved.exists());
        assert_eq!(resolved.download_name(), "Patient summary.docx");
    }

    #[test]
    fn new_export_supersedes_previous_of_same_format() {
        let (_temp, service) = service();
        let old = service
            .replace_report_export(ENTITY, ReportFormat::Pdf, "report", Cursor::new(b"v1"))
            .unwrap();
        let csv = service
            .replace_report_export(ENTITY, ReportFormat::Csv, "report", Cursor::new(b"a,b"))
            .unwrap();
        let new = service
            .replace_report_export(ENTITY, ReportFormat::Pdf, "report", Cursor::new(b"v2"))
            .unwrap();

        let pdfs = service.index().reports(ENTITY, ReportFormat::Pdf).unwrap();
        assert_eq!(pdfs, vec![new.clone()]);
        assert!(service.resolve_path(Modality::ReportExport, old.id).is_err());

        let mut expected = vec![csv.canonical_name, new.canonical_name];
        expected.sort();
        assert_eq!(
            listing(&service, &Bucket::new(Modality::ReportExport, ENTITY)),
            expected
        );
    }

    #[test]
    fn regenerating_identical_report_keeps_its_file() {
        let (_temp, service) = service();
        service
            .replace_report_export(ENTITY, ReportFormat::Csv, "r", Cursor::new(b"same"))
            .unwrap();
        let again = service
            .replace_report_export(ENTITY, ReportFormat::Csv, "r", Cursor::new(b"same"))
            .unwrap();

        assert!(service
            .resolve_path(Modality::ReportExport, again.id)
            .unwrap()
            .exists());
        assert_eq!(service.index().reports(ENTITY, ReportFormat::Csv).unwrap().len(), 1);
    }

    #[test]
    fn failing_generator_keeps_previous_export() {
        struct Failing;
        impl Read for Failing {
            fn read(&mut self, _buf: &mut [u8]) -> io::Result<usize> {
                Err(io::Error::other("renderer crashed"))
            }
        }

        let (_temp, service) = service();
        let old = service
            .replace_report_export(ENTITY, ReportFormat::Pdf, "r", Cursor::new(b"v1"))
            .unwrap();
        assert!(service
            .replace_report_export(ENTITY, ReportFormat::Pdf, "r", Failing)
            .is_err());
        assert!(service
            .resolve_path(Modality::ReportExport, old.id)
            .unwrap()
            .exists());
    }

    #[test]
    fn blank_name_is_rejected() {
        let (_temp, service) = service();
        assert!(matches!(
            service.replace_report_export(ENTITY, ReportFormat::Pdf, " ", Cursor::new(b"x")),
            Err(IngestError::InvalidInput(_))
        ));
    }
}
