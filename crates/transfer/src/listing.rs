//! Directory listing: LIST_FILES followed by CONTINUE_LIST_FILES until the
//! brick reports end of file, then parsing of the accumulated text.

use ev3explorer_protocol::constants::MAX_REPLY_SIZE;
use ev3explorer_protocol::{BinaryBuffer, Status, SystemCommand};
use tracing::debug;

use crate::TransferError;
use crate::connection::BrickConnection;
use crate::exchange::{Exchange, Request, check_reply, drive};
use crate::types::DirectoryEntry;

/// Where a listing exchange stands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListingState {
    Init,
    Listing { handle: u8 },
    Done,
    Failed,
}

/// Accumulates the listing text of one directory.
#[derive(Debug)]
pub struct ListingSession {
    path: String,
    state: ListingState,
    data: Vec<u8>,
    total: Option<u32>,
}

impl ListingSession {
    /// Starts a listing of `path`, an absolute brick path ending in `/`.
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            state: ListingState::Init,
            data: Vec::new(),
            total: None,
        }
    }

    pub fn state(&self) -> ListingState {
        self.state
    }

    /// Listing size announced by the first reply.
    pub fn total(&self) -> Option<u32> {
        self.total
    }

    fn fail(&mut self, err: TransferError) -> TransferError {
        self.state = ListingState::Failed;
        self.data.clear();
        err
    }

    fn accept_first(&mut self, reply: Vec<u8>, status: Status) {
        let total = u32::from_le_bytes([reply[1], reply[2], reply[3], reply[4]]);
        let handle = reply[5];
        debug!(path = %self.path, handle, total, "listing started");
        self.total = Some(total);
        self.data.extend_from_slice(&reply[6..]);
        self.state = if status == Status::EndOfFile {
            ListingState::Done
        } else {
            ListingState::Listing { handle }
        };
    }

    fn accept_continue(&mut self, reply: Vec<u8>, status: Status) {
        self.data.extend_from_slice(&reply[2..]);
        if status == Status::EndOfFile {
            self.state = ListingState::Done;
        }
    }
}

impl Exchange for ListingSession {
    type Output = Vec<DirectoryEntry>;

    fn next_request(&self) -> Option<Request> {
        match self.state {
            ListingState::Init => {
                let mut b = BinaryBuffer::new();
                b.append_u16(MAX_REPLY_SIZE).append_zero_terminated(&self.path);
                Some(Request {
                    command: SystemCommand::ListFiles,
                    payload: b.into_bytes(),
                })
            }
            ListingState::Listing { handle } => {
                let mut b = BinaryBuffer::new();
                b.append_u8(handle).append_u16(MAX_REPLY_SIZE);
                Some(Request {
                    command: SystemCommand::ContinueListFiles,
                    payload: b.into_bytes(),
                })
            }
            ListingState::Done | ListingState::Failed => None,
        }
    }

    fn accept(
        &mut self,
        command: SystemCommand,
        reply: Option<Vec<u8>>,
    ) -> Result<(), TransferError> {
        let min_len = match self.state {
            ListingState::Init => 6,
            ListingState::Listing { .. } => 2,
            ListingState::Done | ListingState::Failed => {
                return Err(self.fail(TransferError::InvalidArgument(
                    "listing already finished".into(),
                )));
            }
        };
        let (status, reply) = check_reply(command, reply, min_len).map_err(|e| self.fail(e))?;
        match self.state {
            ListingState::Init => self.accept_first(reply, status),
            _ => self.accept_continue(reply, status),
        }
        Ok(())
    }

    fn finish(self) -> Vec<DirectoryEntry> {
        if self.state != ListingState::Done {
            return Vec::new();
        }
        let entries = parse_listing(&self.data);
        debug!(path = %self.path, bytes = self.data.len(), entries = entries.len(), "listing parsed");
        entries
    }
}

/// Lists `path` on the brick, sorted by name.
pub fn list_directory<C>(conn: &mut C, path: &str) -> Result<Vec<DirectoryEntry>, TransferError>
where
    C: BrickConnection + ?Sized,
{
    drive(conn, ListingSession::new(path))
}

/// Parses listing text into entries sorted by name.
///
/// File lines are `<md5> <hex size> <name>` or `<hex size> <name>`. Names
/// with spaces only survive the three-field form: `"10 A B"` reads as size
/// `0xA` and name `B`. Lines that fit none of the known shapes are skipped.
pub fn parse_listing(data: &[u8]) -> Vec<DirectoryEntry> {
    let text = String::from_utf8_lossy(data);
    let mut entries: Vec<DirectoryEntry> = text
        .split('\n')
        .map(|line| line.trim_end_matches('\r'))
        .filter(|line| !line.is_empty())
        .filter_map(parse_line)
        .collect();
    entries.sort_by(|a, b| a.name().cmp(b.name()));
    entries
}

fn parse_line(line: &str) -> Option<DirectoryEntry> {
    if let Some(dir) = line.strip_suffix('/') {
        if dir.is_empty() || dir == "." || dir == ".." || dir.contains('/') {
            return None;
        }
        return Some(DirectoryEntry::directory(dir));
    }

    let fields: Vec<&str> = line.splitn(3, ' ').collect();
    let (size, name) = match fields.as_slice() {
        [_digest, size, name] => (*size, *name),
        [size, name] => (*size, *name),
        _ => {
            debug!(line, "skipping listing line without size and name");
            return None;
        }
    };
    if name.is_empty() || name.contains('/') || name == "." || name == ".." {
        debug!(line, "skipping listing line with unusable name");
        return None;
    }
    match u32::from_str_radix(size, 16) {
        Ok(size) => Some(DirectoryEntry::file(name, size)),
        Err(_) => {
            debug!(line, "skipping listing line with non-hex size");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::{ScriptedConnection, reply};

    const LISTING: &[u8] = b"./\n../\nA/\n0123456789ABCDEF0123456789ABCDEF 1F file.rbf\n";

    fn first_reply(status: u8, total: u32, handle: u8, data: &[u8]) -> Option<Vec<u8>> {
        let mut rest = total.to_le_bytes().to_vec();
        rest.push(handle);
        rest.extend_from_slice(data);
        reply(status, &rest)
    }

    fn continue_reply(status: u8, handle: u8, data: &[u8]) -> Option<Vec<u8>> {
        let mut rest = vec![handle];
        rest.extend_from_slice(data);
        reply(status, &rest)
    }

    #[test]
    fn parses_directories_and_files() {
        let entries = parse_listing(b"A/\n1F file.rbf\n");
        assert_eq!(
            entries,
            vec![DirectoryEntry::directory("A"), DirectoryEntry::file("file.rbf", 0x1F)]
        );
    }

    #[test]
    fn dot_entries_are_discarded() {
        let entries = parse_listing(b"./\n../\n");
        assert!(entries.is_empty());
    }

    #[test]
    fn brick_format_uses_second_field_as_size() {
        let entries = parse_listing(b"D41D8CD98F00B204E9800998ECF8427E 0000012C My Program.rbf\r\n");
        assert_eq!(entries, vec![DirectoryEntry::file("My Program.rbf", 300)]);
    }

    #[test]
    fn malformed_lines_are_skipped() {
        let entries = parse_listing(b"garbage\nZZ bad.rbf\n10 \nb.rbf\n20 ok.rbf\n");
        assert_eq!(entries, vec![DirectoryEntry::file("ok.rbf", 0x20)]);
    }

    #[test]
    fn entries_sorted_by_name() {
        let entries = parse_listing(b"2 b\n1 a\nC/\n");
        let names: Vec<&str> = entries.iter().map(|e| e.name()).collect();
        assert_eq!(names, vec!["C", "a", "b"]);
    }

    #[test]
    fn single_reply_listing() {
        let mut conn = ScriptedConnection::new(vec![first_reply(0x08, LISTING.len() as u32, 2, LISTING)]);
        let entries = list_directory(&mut conn, "/./home/root/lms2012/prjs/").unwrap();

        assert_eq!(entries.len(), 2);
        assert!(entries[0].is_directory());
        assert_eq!(entries[1].size_bytes(), 0x1F);

        let sent = conn.sent(SystemCommand::ListFiles);
        assert_eq!(sent.len(), 1);
        assert_eq!(&sent[0][..2], &[0xF4, 0x01]);
        assert_eq!(&sent[0][2..], b"/./home/root/lms2012/prjs/\0");
        assert!(conn.sent(SystemCommand::ContinueListFiles).is_empty());
    }

    /// Serves `segments` as one LIST_FILES reply and as many
    /// CONTINUE_LIST_FILES replies as needed, the last one flagged EOF.
    fn list_split(segments: &[&[u8]]) -> (Vec<DirectoryEntry>, ScriptedConnection) {
        let last = segments.len() - 1;
        let status = |i: usize| if i == last { 0x08 } else { 0x00 };
        let replies = segments
            .iter()
            .enumerate()
            .map(|(i, seg)| {
                if i == 0 {
                    first_reply(status(i), LISTING.len() as u32, 4, seg)
                } else {
                    continue_reply(status(i), 4, seg)
                }
            })
            .collect();
        let mut conn = ScriptedConnection::new(replies);
        let entries = list_directory(&mut conn, "/./x/").unwrap();
        (entries, conn)
    }

    #[test]
    fn split_listing_matches_unsplit() {
        let expected = parse_listing(LISTING);
        assert_eq!(expected.len(), 2);

        for i in 0..=LISTING.len() {
            let (a, b) = LISTING.split_at(i);
            let (entries, conn) = list_split(&[a, b]);
            assert_eq!(entries, expected, "split at {i}");
            assert_eq!(conn.sent(SystemCommand::ContinueListFiles).len(), 1);

            for j in i..=LISTING.len() {
                let (b, c) = LISTING[i..].split_at(j - i);
                let (entries, conn) = list_split(&[a, b, c]);
                assert_eq!(entries, expected, "split at {i} and {j}");
                let cont = conn.sent(SystemCommand::ContinueListFiles);
                assert_eq!(cont, vec![&[4, 0xF4, 0x01][..], &[4, 0xF4, 0x01][..]]);
            }
        }
    }

    #[test]
    fn two_field_names_stop_at_first_space() {
        assert_eq!(parse_listing(b"10 A B\n"), vec![DirectoryEntry::file("B", 0xA)]);
        assert_eq!(
            parse_listing(b"0123456789ABCDEF0123456789ABCDEF 10 A B\n"),
            vec![DirectoryEntry::file("A B", 0x10)]
        );
    }

    #[test]
    fn short_first_reply_fails() {
        let mut conn = ScriptedConnection::new(vec![reply(0x00, &[1, 0, 0, 0])]);
        let err = list_directory(&mut conn, "/./").unwrap_err();
        assert!(matches!(
            err,
            TransferError::ResponseTooShort {
                actual: 5,
                expected: 6,
                ..
            }
        ));
    }

    #[test]
    fn bad_status_fails() {
        let mut conn = ScriptedConnection::new(vec![first_reply(0x06, 0, 0, b"")]);
        let err = list_directory(&mut conn, "/./nowhere/").unwrap_err();
        assert!(err.is_protocol_violation());
    }

    #[test]
    fn missing_continue_reply_discards_partial_data() {
        let mut session = ListingSession::new("/./x/");
        session
            .accept(SystemCommand::ListFiles, first_reply(0x00, 40, 1, b"A/\n"))
            .unwrap();
        assert_eq!(session.state(), ListingState::Listing { handle: 1 });
        assert_eq!(session.total(), Some(40));

        let err = session
            .accept(SystemCommand::ContinueListFiles, None)
            .unwrap_err();
        assert!(matches!(err, TransferError::NoResponse(_)));
        assert_eq!(session.state(), ListingState::Failed);
        assert!(session.next_request().is_none());
        assert!(session.finish().is_empty());
    }
}
