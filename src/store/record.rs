use crate::Error;
use time::macros::format_description;
use time::{OffsetDateTime, PrimitiveDateTime};

/// A row as kept by a [`RecordStore`](super::RecordStore).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StoredRecord {
    pub id: String,
    pub payload: Vec<u8>,
    pub write_date: WriteDate,
}

/// The last-write time of a record, in UTC without an offset.
///
/// Older tables may hand the column back as text; it is parsed on use.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum WriteDate {
    Timestamp(PrimitiveDateTime),
    Text(String),
}

impl WriteDate {
    /// Returns the structured timestamp, parsing the textual form
    /// (`YYYY-MM-DD HH:MM:SS[.ffffff]`) if needed.
    pub fn normalize(&self) -> Result<PrimitiveDateTime, Error> {
        match self {
            WriteDate::Timestamp(ts) => Ok(*ts),
            WriteDate::Text(text) => {
                let text = text.trim();
                PrimitiveDateTime::parse(
                    text,
                    format_description!("[year]-[month]-[day] [hour]:[minute]:[second].[subsecond]"),
                )
                .or_else(|_| {
                    PrimitiveDateTime::parse(
                        text,
                        format_description!("[year]-[month]-[day] [hour]:[minute]:[second]"),
                    )
                })
                .map_err(|e| Error::Timestamp(format!("{text:?}: {e}")))
            }
        }
    }
}

impl From<PrimitiveDateTime> for WriteDate {
    fn from(value: PrimitiveDateTime) -> Self {
        WriteDate::Timestamp(value)
    }
}

/// The current UTC time with the offset dropped, as stored in `write_date`.
pub fn utc_now() -> PrimitiveDateTime {
    let now = OffsetDateTime::now_utc();
    PrimitiveDateTime::new(now.date(), now.time())
}
