use std::fs::{self, File, OpenOptions};
use std::io::{self, BufReader, BufWriter, Read, Write};
use std::path::{Path, PathBuf};

use tracing::warn;

use crate::model::StoreEvent;

/// Frame one event as `[u32 len][bincode payload][u32 crc32]`, little endian.
fn write_record(writer: &mut impl Write, event: &StoreEvent) -> io::Result<()> {
    let payload =
        bincode::serialize(event).map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
    let len = u32::try_from(payload.len())
        .map_err(|_| io::Error::new(io::ErrorKind::InvalidData, "record too large"))?;
    writer.write_all(&len.to_le_bytes())?;
    writer.write_all(&payload)?;
    writer.write_all(&crc32fast::hash(&payload).to_le_bytes())?;
    Ok(())
}

/// Fill `buf` completely, or report a clean/torn end of file as `Ok(false)`.
fn read_full(reader: &mut impl Read, buf: &mut [u8]) -> io::Result<bool> {
    match reader.read_exact(buf) {
        Ok(()) => Ok(true),
        Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => Ok(false),
        Err(e) => Err(e),
    }
}

/// Next intact record and its framed length, or `None` at the end of the
/// valid prefix.
fn read_record(reader: &mut impl Read) -> io::Result<Option<(StoreEvent, u64)>> {
    let mut len_buf = [0u8; 4];
    if !read_full(reader, &mut len_buf)? {
        return Ok(None);
    }
    let mut payload = vec![0u8; u32::from_le_bytes(len_buf) as usize];
    if !read_full(reader, &mut payload)? {
        return Ok(None);
    }
    let mut crc_buf = [0u8; 4];
    if !read_full(reader, &mut crc_buf)? {
        return Ok(None);
    }
    if u32::from_le_bytes(crc_buf) != crc32fast::hash(&payload) {
        warn!("WAL record failed checksum, discarding tail");
        return Ok(None);
    }
    match bincode::deserialize(&payload) {
        Ok(event) => Ok(Some((event, 8 + payload.len() as u64))),
        Err(e) => {
            warn!("WAL record failed to decode, discarding tail: {e}");
            Ok(None)
        }
    }
}

/// Append-only log of calendar mutations.
///
/// A torn or corrupt trailing record (crash mid-write) ends replay; everything
/// before it is kept.
pub struct Wal {
    writer: BufWriter<File>,
    path: PathBuf,
    appends_since_compact: u64,
}

impl Wal {
    pub fn open(path: &Path) -> io::Result<Self> {
        if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
            fs::create_dir_all(dir)?;
        }
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        Ok(Self {
            writer: BufWriter::new(file),
            path: path.to_path_buf(),
            appends_since_compact: 0,
        })
    }

    #[cfg(test)]
    pub fn append(&mut self, event: &StoreEvent) -> io::Result<()> {
        self.append_buffered(event)?;
        self.flush_sync()
    }

    /// Buffer one record. Durable only after `flush_sync`.
    pub fn append_buffered(&mut self, event: &StoreEvent) -> io::Result<()> {
        write_record(&mut self.writer, event)?;
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

    fn compact_path(path: &Path) -> PathBuf {
        path.with_extension("wal.compact")
    }

    /// Write a snapshot of `events` next to the log and fsync it.
    pub fn write_compact_file(path: &Path, events: &[StoreEvent]) -> io::Result<()> {
        let mut writer = BufWriter::new(File::create(Self::compact_path(path))?);
        for event in events {
            write_record(&mut writer, event)?;
        }
        writer.flush()?;
        writer.get_ref().sync_all()
    }

    /// Rename the snapshot over the log and continue appending to it.
    pub fn swap_compact_file(&mut self) -> io::Result<()> {
        self.writer.flush()?;
        fs::rename(Self::compact_path(&self.path), &self.path)?;
        let file = OpenOptions::new().append(true).open(&self.path)?;
        self.writer = BufWriter::new(file);
        self.appends_since_compact = 0;
        Ok(())
    }

    pub fn appends_since_compact(&self) -> u64 {
        self.appends_since_compact
    }

    /// Every intact event in `path`, oldest first. A missing file is empty.
    pub fn replay(path: &Path) -> io::Result<Vec<StoreEvent>> {
        Self::replay_prefix(path).map(|(events, _)| events)
    }

    /// Replay, then cut any torn or corrupt tail off the file so later
    /// appends follow the last intact record.
    pub fn recover(path: &Path) -> io::Result<Vec<StoreEvent>> {
        let (events, valid_len) = Self::replay_prefix(path)?;
        let file = match OpenOptions::new().write(true).open(path) {
            Ok(f) => f,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(events),
            Err(e) => return Err(e),
        };
        let file_len = file.metadata()?.len();
        if file_len > valid_len {
            warn!(
                discarded = file_len - valid_len,
                "truncating WAL tail at byte {valid_len}"
            );
            file.set_len(valid_len)?;
            file.sync_all()?;
        }
        Ok(events)
    }

    /// Intact events plus the byte length of the prefix that holds them.
    fn replay_prefix(path: &Path) -> io::Result<(Vec<StoreEvent>, u64)> {
        let file = match File::open(path) {
            Ok(f) => f,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok((Vec::new(), 0)),
            Err(e) => return Err(e),
        };
        let mut reader = BufReader::new(file);
        let mut events = Vec::new();
        let mut valid_len = 0u64;
        while let Some((event, record_len)) = read_record(&mut reader)? {
            events.push(event);
            valid_len += record_len;
        }
        Ok((events, valid_len))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Availability, DayOfWeek};
    use chrono::NaiveDate;
    use ulid::Ulid;

    fn tmp_path(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join("consultcal_test_wal");
        fs::create_dir_all(&dir).unwrap();
        let path = dir.join(name);
        let _ = fs::remove_file(&path);
        path
    }

    fn consultant(user_id: Ulid) -> StoreEvent {
        StoreEvent::ConsultantCreated {
            id: Ulid::new(),
            user_id,
            skill: "bookkeeping".into(),
        }
    }

    fn window_added(user_id: Ulid) -> StoreEvent {
        StoreEvent::AvailabilityAdded {
            user_id,
            availability: Availability {
                id: Ulid::new(),
                consultant_id: Ulid::new(),
                day: DayOfWeek::Wednesday,
                active_from: NaiveDate::from_ymd_opt(2026, 10, 1).unwrap(),
                active_until: NaiveDate::from_ymd_opt(2026, 12, 31).unwrap(),
                start_time: "09:00".into(),
                end_time: "12:00".into(),
            },
        }
    }

    #[test]
    fn append_and_replay() {
        let path = tmp_path("append_and_replay.wal");
        let user = Ulid::new();
        let events = vec![consultant(user), window_added(user)];
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
    fn torn_tail_is_discarded() {
        let path = tmp_path("torn_tail.wal");
        let event = consultant(Ulid::new());
        {
            let mut wal = Wal::open(&path).unwrap();
            wal.append(&event).unwrap();
        }
        {
            let mut f = OpenOptions::new().append(true).open(&path).unwrap();
            f.write_all(&[9u8, 0, 0, 0, 1, 2]).unwrap();
        }
        assert_eq!(Wal::replay(&path).unwrap(), vec![event]);
        let _ = fs::remove_file(&path);
    }

    #[test]
    fn recovery_cuts_the_torn_tail_before_new_appends() {
        let path = tmp_path("recover_torn.wal");
        let user = Ulid::new();
        let first = consultant(user);
        {
            let mut wal = Wal::open(&path).unwrap();
            wal.append(&first).unwrap();
        }
        let intact_len = fs::metadata(&path).unwrap().len();
        {
            let mut f = OpenOptions::new().append(true).open(&path).unwrap();
            f.write_all(&[200u8, 0, 0, 0, 1, 2, 3]).unwrap();
        }

        assert_eq!(Wal::recover(&path).unwrap(), vec![first.clone()]);
        assert_eq!(fs::metadata(&path).unwrap().len(), intact_len);

        let second = window_added(user);
        {
            let mut wal = Wal::open(&path).unwrap();
            wal.append(&second).unwrap();
        }
        assert_eq!(Wal::replay(&path).unwrap(), vec![first, second]);
        let _ = fs::remove_file(&path);
    }

    #[test]
    fn recovery_leaves_a_clean_log_alone() {
        let path = tmp_path("recover_clean.wal");
        let event = consultant(Ulid::new());
        {
            let mut wal = Wal::open(&path).unwrap();
            wal.append(&event).unwrap();
        }
        let len = fs::metadata(&path).unwrap().len();
        assert_eq!(Wal::recover(&path).unwrap(), vec![event]);
        assert_eq!(fs::metadata(&path).unwrap().len(), len);
        assert!(Wal::recover(&tmp_path("recover_missing.wal")).unwrap().is_empty());
        let _ = fs::remove_file(&path);
    }

    #[test]
    fn missing_file_replays_empty() {
        let path = tmp_path("missing.wal");
        assert!(Wal::replay(&path).unwrap().is_empty());
    }

    #[test]
    fn bad_checksum_stops_replay() {
        let path = tmp_path("bad_crc.wal");
        let good = consultant(Ulid::new());
        let bad = StoreEvent::BookingDeleted {
            id: Ulid::new(),
            user_id: Ulid::new(),
        };
        {
            let mut wal = Wal::open(&path).unwrap();
            wal.append(&good).unwrap();
        }
        {
            let payload = bincode::serialize(&bad).unwrap();
            let mut f = OpenOptions::new().append(true).open(&path).unwrap();
            f.write_all(&(payload.len() as u32).to_le_bytes()).unwrap();
            f.write_all(&payload).unwrap();
            f.write_all(&0xDEAD_BEEFu32.to_le_bytes()).unwrap();
        }
        assert_eq!(Wal::replay(&path).unwrap(), vec![good]);
        let _ = fs::remove_file(&path);
    }

    #[test]
    fn compaction_shrinks_and_keeps_appending() {
        let path = tmp_path("compaction.wal");
        let user = Ulid::new();
        let keep = consultant(user);

        let mut wal = Wal::open(&path).unwrap();
        wal.append(&keep).unwrap();
        for _ in 0..20 {
            let added = window_added(user);
            let StoreEvent::AvailabilityAdded { availability, .. } = &added else {
                unreachable!()
            };
            let removed = StoreEvent::AvailabilityRemoved {
                id: availability.id,
                user_id: user,
            };
            wal.append(&added).unwrap();
            wal.append(&removed).unwrap();
        }
        assert_eq!(wal.appends_since_compact(), 41);
        let before = fs::metadata(&path).unwrap().len();

        Wal::write_compact_file(&path, std::slice::from_ref(&keep)).unwrap();
        wal.swap_compact_file().unwrap();
        assert_eq!(wal.appends_since_compact(), 0);
        let after = fs::metadata(&path).unwrap().len();
        assert!(after < before, "{after} < {before}");

        let later = window_added(user);
        wal.append(&later).unwrap();
        drop(wal);

        assert_eq!(Wal::replay(&path).unwrap(), vec![keep, later]);
        let _ = fs::remove_file(&path);
    }

    #[test]
    fn buffered_appends_land_after_flush() {
        let path = tmp_path("buffered.wal");
        let user = Ulid::new();
        let events: Vec<_> = (0..5).map(|_| consultant(user)).collect();
        {
            let mut wal = Wal::open(&path).unwrap();
            for e in &events {
                wal.append_buffered(e).unwrap();
            }
            wal.flush_sync().unwrap();
        }
        assert_eq!(Wal::replay(&path).unwrap(), events);
        let _ = fs::remove_file(&path);
    }

    #[test]
    fn open_creates_missing_directories() {
        let dir = std::env::temp_dir()
            .join("consultcal_test_wal")
            .join(Ulid::new().to_string());
        let path = dir.join("nested.wal");
        let mut wal = Wal::open(&path).unwrap();
        wal.append(&consultant(Ulid::new())).unwrap();
        assert!(path.exists());
        let _ = fs::remove_dir_all(&dir);
    }
}
