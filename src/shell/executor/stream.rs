use std::collections::BTreeMap;
use std::io;
use std::os::fd::{AsRawFd, OwnedFd, RawFd};

use log::trace;

use super::executor::StreamId;
use crate::shell::error::ExecError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamMode {
    Input,
    Output,
}

#[derive(Debug)]
pub struct Stream {
    fd: OwnedFd,
    mode: StreamMode,
}

impl Stream {
    pub fn mode(&self) -> StreamMode {
        self.mode
    }

    pub fn raw_fd(&self) -> RawFd {
        self.fd.as_raw_fd()
    }

    pub fn try_clone_fd(&self) -> io::Result<OwnedFd> {
        self.fd.try_clone()
    }
}

/// Every descriptor the interpreter has open on behalf of commands.
///
/// A forked child closes all of them after installing its own standard
/// streams, and the parent closes each one as soon as the command that
/// owns it is done, so no descriptor outlives its pipeline stage.
#[derive(Debug, Default)]
pub struct StreamRegistry {
    streams: BTreeMap<StreamId, Stream>,
    next_id: usize,
}

impl StreamRegistry {
    pub fn insert(&mut self, fd: OwnedFd, mode: StreamMode) -> StreamId {
        let id = StreamId(self.next_id);
        self.next_id += 1;
        trace!("registered stream {} (fd {}, {:?})", id, fd.as_raw_fd(), mode);
        self.streams.insert(id, Stream { fd, mode });
        id
    }

    pub fn get(&self, id: StreamId) -> Option<&Stream> {
        self.streams.get(&id)
    }

    pub fn close(&mut self, id: StreamId) -> Result<(), ExecError> {
        let stream = self.streams.remove(&id).ok_or(ExecError::UnknownStream(id))?;
        trace!("closing stream {} (fd {})", id, stream.raw_fd());
        Ok(())
    }

    /// Closes every registered stream.
    pub fn clear(&mut self) {
        self.streams.clear();
    }

    pub fn raw_fds(&self) -> Vec<RawFd> {
        self.streams.values().map(Stream::raw_fd).collect()
    }

    pub fn len(&self) -> usize {
        self.streams.len()
    }
}
