use std::fs::{self, File, OpenOptions};
use std::io::{self, BufReader, BufWriter, Read, Write};
use std::path::{Path, PathBuf};

use crate::model::Event;

/// Upper bound on one encoded entry. A larger length prefix can only come
/// from a torn or corrupt write.
const MAX_ENTRY_BYTES: usize = 1 << 20;

fn encode_event(writer: &mut impl Write, event: &Event) -> io::Result<()> {
    let payload =
        bincode::serialize(event).map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
    let len = u32::try_from(payload.len())
        .map_err(|_| io::Error::new(io::ErrorKind::InvalidData, "WAL entry too large"))?;
    let crc = crc32fast::hash(&payload);
    writer.write_all(&len.to_le_bytes())?;
    writer.write_all(&payload)?;
    writer.write_all(&crc.to_le_bytes())?;
    Ok(())
}

fn compact_tmp_path(path: &Path) -> PathBuf {
    path.with_extension("wal.tmp")
}

/// Read exactly `buf.len()` bytes. `Ok(false)` means the log ended first.
fn read_entry_part(reader: &mut impl Read, buf: &mut [u8]) -> io::Result<bool> {
    match reader.read_exact(buf) {
        Ok(()) => Ok(true),
        Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => Ok(false),
        Err(e) => Err(e),
    }
}

/// Append-only booking log.
///
/// Format per entry: `[u32: len][bincode: Event][u32: crc32]`
/// - `len` is the byte length of the bincode payload (not including the CRC).
/// - A torn last entry is dropped on replay via the length prefix and CRC.
pub struct Wal {
    writer: BufWriter<File>,
    path: PathBuf,
    appends_since_compact: u64,
}

impl Wal {
    pub fn open(path: &Path) -> io::Result<Self> {
        if let Some(dir) = path.parent()
            && !dir.as_os_str().is_empty()
        {
            fs::create_dir_all(dir)?;
        }
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        Ok(Self {
            writer: BufWriter::new(file),
            path: path.to_path_buf(),
            appends_since_compact: 0,
        })
    }

    /// Append one event and fsync. The server goes through
    /// `append_buffered` + `flush_sync` for group commit.
    #[cfg(test)]
    pub fn append(&mut self, event: &Event) -> io::Result<()> {
        self.append_buffered(event)?;
        self.flush_sync()
    }

    /// Buffer one event. Not durable until `flush_sync`.
    pub fn append_buffered(&mut self, event: &Event) -> io::Result<()> {
        encode_event(&mut self.writer, event)?;
        self.appends_since_compact += 1;
        Ok(())
    }

    pub fn flush_sync(&mut self) -> io::Result<()> {
        self.writer.flush()?;
        self.writer.get_ref().sync_all()
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Write the compacted event list to `<wal>.tmp` and fsync it.
    pub fn write_compact_file(path: &Path, events: &[Event]) -> io::Result<()> {
        let file = File::create(compact_tmp_path(path))?;
        let mut writer = BufWriter::new(file);
        for event in events {
            encode_event(&mut writer, event)?;
        }
        writer.flush()?;
        writer.get_ref().sync_all()
    }

    /// Rename the temp file over the log and reopen it for appends.
    pub fn swap_compact_file(&mut self) -> io::Result<()> {
        self.writer.flush()?;
        fs::rename(compact_tmp_path(&self.path), &self.path)?;
        let file = OpenOptions::new().create(true).append(true).open(&self.path)?;
        self.writer = BufWriter::new(file);
        self.appends_since_compact = 0;
        Ok(())
    }

    #[cfg(test)]
    pub fn compact(&mut self, events: &[Event]) -> io::Result<()> {
        Self::write_compact_file(&self.path, events)?;
        self.swap_compact_file()
    }

    pub fn appends_since_compact(&self) -> u64 {
        self.appends_since_compact
    }

    /// Read every intact event. Replay stops at the first torn or corrupt
    /// entry; everything after it is ignored.
    pub fn replay(path: &Path) -> io::Result<Vec<Event>> {
        Self::scan(path).map(|(events, _)| events)
    }

    /// Replay the log, cut off anything past the last intact entry, and open
    /// it for appends. New entries must never land behind a torn tail, or the
    /// next replay would stop before reaching them.
    pub fn recover(path: &Path) -> io::Result<(Self, Vec<Event>)> {
        let (events, intact_len) = Self::scan(path)?;
        match fs::metadata(path) {
            Ok(meta) if meta.len() > intact_len => {
                tracing::warn!(
                    path = %path.display(),
                    dropped_bytes = meta.len() - intact_len,
                    "truncating WAL to last intact entry"
                );
                let file = OpenOptions::new().write(true).open(path)?;
                file.set_len(intact_len)?;
                file.sync_all()?;
            }
            Ok(_) => {}
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => return Err(e),
        }
        Ok((Self::open(path)?, events))
    }

    /// Intact events and the byte length they occupy from the start of the file.
    fn scan(path: &Path) -> io::Result<(Vec<Event>, u64)> {
        let file = match File::open(path) {
            Ok(f) => f,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok((Vec::new(), 0)),
            Err(e) => return Err(e),
        };
        let mut reader = BufReader::new(file);
        let mut events = Vec::new();
        let mut intact_len = 0u64;

        loop {
            let mut len_buf = [0u8; 4];
            if !read_entry_part(&mut reader, &mut len_buf)? {
                break;
            }
            let len = u32::from_le_bytes(len_buf) as usize;
            if len > MAX_ENTRY_BYTES {
                tracing::warn!(path = %path.display(), entry = events.len(), len, "WAL entry length out of range, stopping replay");
                break;
            }

            let mut payload = vec![0u8; len];
            let mut crc_buf = [0u8; 4];
            if !read_entry_part(&mut reader, &mut payload)? || !read_entry_part(&mut reader, &mut crc_buf)? {
                tracing::warn!(path = %path.display(), entry = events.len(), "WAL ends with a torn entry, discarding it");
                break;
            }

            if u32::from_le_bytes(crc_buf) != crc32fast::hash(&payload) {
                tracing::warn!(path = %path.display(), entry = events.len(), "WAL entry failed CRC check, stopping replay");
                break;
            }

            match bincode::deserialize::<Event>(&payload) {
                Ok(event) => events.push(event),
                Err(e) => {
                    tracing::warn!(path = %path.display(), entry = events.len(), "undecodable WAL entry, stopping replay: {e}");
                    break;
                }
            }
            intact_len += 8 + len as u64;
        }

        Ok((events, intact_len))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::fixtures::booking;
    use crate::model::BookingStatus;
    use ulid::Ulid;

    fn tmp_path(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join("hallbook_test_wal");
        fs::create_dir_all(&dir).unwrap();
        let path = dir.join(name);
        let _ = fs::remove_file(&path);
        path
    }

    fn submitted(start: i64) -> Event {
        Event::BookingSubmitted {
            booking: booking("Auditorium", start, start + 1000, BookingStatus::Pending),
        }
    }

    #[test]
    fn append_and_replay() {
        let path = tmp_path("append_and_replay.wal");
        let first = submitted(1000);
        let decided = Event::BookingDecided {
            id: Ulid::new(),
            hall: "Auditorium".into(),
            status: BookingStatus::Approved,
        };
        let events = vec![first, decided];

        {
            let mut wal = Wal::open(&path).unwrap();
            for e in &events {
                wal.append(e).unwrap();
            }
        }

        assert_eq!(Wal::replay(&path).unwrap(), events);
        let _ = fs::remove_file(&path);
    }

    #[test]
    fn open_creates_missing_directory() {
        let dir = std::env::temp_dir().join("hallbook_test_wal").join("nested_dir");
        let _ = fs::remove_dir_all(&dir);
        let path = dir.join("bookings.wal");
        let mut wal = Wal::open(&path).unwrap();
        wal.append(&submitted(0)).unwrap();
        assert_eq!(Wal::replay(&path).unwrap().len(), 1);
        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn replay_handles_truncation() {
        let path = tmp_path("truncation.wal");
        let event = submitted(1000);
        {
            let mut wal = Wal::open(&path).unwrap();
            wal.append(&event).unwrap();
        }
        // Torn second entry: a length prefix and a few payload bytes.
        {
            let mut f = OpenOptions::new().append(true).open(&path).unwrap();
            f.write_all(&[0u8; 6]).unwrap();
        }

        assert_eq!(Wal::replay(&path).unwrap(), vec![event]);
        let _ = fs::remove_file(&path);
    }

    #[test]
    fn recover_truncates_torn_tail_before_appending() {
        let path = tmp_path("recover_torn.wal");
        let first = submitted(1000);
        {
            let mut wal = Wal::open(&path).unwrap();
            wal.append(&first).unwrap();
        }
        let intact = fs::metadata(&path).unwrap().len();
        {
            let mut f = OpenOptions::new().append(true).open(&path).unwrap();
            f.write_all(&[7u8; 6]).unwrap();
        }

        let later = submitted(9000);
        {
            let (mut wal, events) = Wal::recover(&path).unwrap();
            assert_eq!(events, vec![first.clone()]);
            assert_eq!(fs::metadata(&path).unwrap().len(), intact);
            wal.append(&later).unwrap();
        }

        assert_eq!(Wal::replay(&path).unwrap(), vec![first, later]);
        let _ = fs::remove_file(&path);
    }

    #[test]
    fn recover_missing_file_starts_empty() {
        let path = tmp_path("recover_missing.wal");
        let (_wal, events) = Wal::recover(&path).unwrap();
        assert!(events.is_empty());
        assert!(path.exists());
        let _ = fs::remove_file(&path);
    }

    #[test]
    fn replay_nonexistent_file() {
        let path = tmp_path("nonexistent.wal");
        assert!(Wal::replay(&path).unwrap().is_empty());
    }

    #[test]
    fn replay_stops_at_bad_crc() {
        let path = tmp_path("corrupt_crc.wal");
        let good = submitted(1000);
        {
            let mut wal = Wal::open(&path).unwrap();
            wal.append(&good).unwrap();
        }
        {
            let payload = bincode::serialize(&submitted(5000)).unwrap();
            let mut f = OpenOptions::new().append(true).open(&path).unwrap();
            f.write_all(&(payload.len() as u32).to_le_bytes()).unwrap();
            f.write_all(&payload).unwrap();
            f.write_all(&0xDEADBEEFu32.to_le_bytes()).unwrap();
        }

        assert_eq!(Wal::replay(&path).unwrap(), vec![good]);
        let _ = fs::remove_file(&path);
    }

    #[test]
    fn replay_rejects_absurd_length_prefix() {
        let path = tmp_path("absurd_len.wal");
        {
            let mut f = File::create(&path).unwrap();
            f.write_all(&u32::MAX.to_le_bytes()).unwrap();
            f.write_all(&[1, 2, 3]).unwrap();
        }
        assert!(Wal::replay(&path).unwrap().is_empty());
        let _ = fs::remove_file(&path);
    }

    #[test]
    fn compact_keeps_only_current_state() {
        let path = tmp_path("compact_reduce.wal");
        let Event::BookingSubmitted { booking: mut b } = submitted(1000) else {
            unreachable!()
        };

        {
            let mut wal = Wal::open(&path).unwrap();
            wal.append(&Event::BookingSubmitted { booking: b.clone() }).unwrap();
            for i in 0..10 {
                wal.append(&submitted(10_000 + i * 2000)).unwrap();
            }
            wal.append(&Event::BookingDecided {
                id: b.id,
                hall: b.hall.clone(),
                status: BookingStatus::Approved,
            })
            .unwrap();
        }
        let before = fs::metadata(&path).unwrap().len();

        b.status = BookingStatus::Approved;
        let compacted = vec![Event::BookingSubmitted { booking: b }];
        {
            let mut wal = Wal::open(&path).unwrap();
            wal.compact(&compacted).unwrap();
            assert_eq!(wal.appends_since_compact(), 0);
        }

        let after = fs::metadata(&path).unwrap().len();
        assert!(after < before, "compacted WAL should be smaller: {after} < {before}");
        assert_eq!(Wal::replay(&path).unwrap(), compacted);
        assert!(!compact_tmp_path(&path).exists());
        let _ = fs::remove_file(&path);
    }

    #[test]
    fn compact_then_append() {
        let path = tmp_path("compact_append.wal");
        let compacted = vec![submitted(1000)];
        let later = submitted(9000);

        {
            let mut wal = Wal::open(&path).unwrap();
            wal.append(&compacted[0]).unwrap();
            wal.compact(&compacted).unwrap();
            wal.append(&later).unwrap();
        }

        assert_eq!(Wal::replay(&path).unwrap(), vec![compacted[0].clone(), later]);
        let _ = fs::remove_file(&path);
    }

    #[test]
    fn append_buffered_then_flush_sync() {
        let path = tmp_path("buffered_flush.wal");
        let events: Vec<Event> = (0..5).map(|i| submitted(i * 1000)).collect();

        {
            let mut wal = Wal::open(&path).unwrap();
            for e in &events {
                wal.append_buffered(e).unwrap();
            }
            assert_eq!(wal.appends_since_compact(), 5);
            wal.flush_sync().unwrap();
        }

        assert_eq!(Wal::replay(&path).unwrap(), events);
        let _ = fs::remove_file(&path);
    }
}
