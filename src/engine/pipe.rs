use std::cell::RefCell;
use std::ffi::OsString;
use std::fs::File;
use std::io::{ErrorKind as IoErrorKind, Read, Write};
use std::os::fd::{AsRawFd, FromRawFd, OwnedFd, RawFd};
use std::os::unix::process::CommandExt;
use std::path::{Path, PathBuf};
use std::process::{Child, Command, Stdio};
use std::rc::Rc;

use crate::data::Data;
use crate::error::{Error, Result};
use crate::io::{Direction, IoCallbacks, IoEvent, IoHandler, IoTag};
use super::status::{self, StatusCode, StatusHandler, CommandHandler, ColonLineHandler};


/// Size of one read or write on a pipe.
const CHUNK_SIZE: usize = 4096;


thread_local! {
    /// Backends that closed their pipes before exiting
    static STRAGGLERS: RefCell<Vec<Child>> = RefCell::new(Vec::new());
}


/// Collects the exit status of a backend without blocking.
///
/// A backend that has not exited yet is kept and checked again whenever
/// another one is reaped on this thread.
///
/// * `child` - backend process
fn reap(child: Child) {
    STRAGGLERS.with(|stragglers| {
        let mut stragglers = stragglers.borrow_mut();
        stragglers.push(child);

        stragglers.retain_mut(|child| match child.try_wait() {
            Ok(Some(status)) => {
                tracing::debug!(pid = child.id(), %status, "backend exited");
                false
            }

            Ok(None) => true,

            Err(err) => {
                tracing::warn!(pid = child.id(), error = %err, "cannot reap backend");
                false
            }
        });
    })
}


/// Creates a pipe, both ends are closed on exec.
fn pipe() -> Result<(OwnedFd, OwnedFd)> {
    let mut fds: [libc::c_int; 2] = [-1; 2];
    if -1 == unsafe { libc::pipe(fds.as_mut_ptr()) } {
        return Err(std::io::Error::last_os_error().into());
    }

    let (read, write) = unsafe { (OwnedFd::from_raw_fd(fds[0]), OwnedFd::from_raw_fd(fds[1])) };
    set_fd_flag(read.as_raw_fd(), libc::FD_CLOEXEC)?;
    set_fd_flag(write.as_raw_fd(), libc::FD_CLOEXEC)?;

    Ok((read, write))
}


fn set_fd_flag(fd: RawFd, flag: libc::c_int) -> Result<()> {
    let flags = unsafe { libc::fcntl(fd, libc::F_GETFD) };
    if -1 == flags || -1 == unsafe { libc::fcntl(fd, libc::F_SETFD, flags | flag) } {
        return Err(std::io::Error::last_os_error().into());
    }

    Ok(())
}


fn set_nonblocking(fd: RawFd) -> Result<()> {
    let flags = unsafe { libc::fcntl(fd, libc::F_GETFL) };
    if -1 == flags || -1 == unsafe { libc::fcntl(fd, libc::F_SETFL, flags | libc::O_NONBLOCK) } {
        return Err(std::io::Error::last_os_error().into());
    }

    Ok(())
}


/// Removes one line from the front of a buffer, without the newline.
fn next_line(buffer: &mut Vec<u8>) -> Option<Vec<u8>> {
    let end = buffer
        .iter()
        .position(|b| *b == b'\n')?;

    let mut line: Vec<u8> = buffer.drain(..=end).collect();
    line.pop();
    Some(line)
}


/// Where the backend's standard output goes.
enum Output {
    Data(Data),
    ColonLines,
}


/// Input passed through an inherited descriptor.
struct ExtraInput {
    data: Data,
    parent: OwnedFd,
    child: OwnedFd,
}


/// Command line and data wiring of one backend run.
#[derive(Default)]
pub(crate) struct Invocation {
    args: Vec<OsString>,
    stdin: Option<Data>,
    stdout: Option<Output>,
    extra_inputs: Vec<ExtraInput>,
}


impl Invocation {
    pub(crate) fn new() -> Self {
        Invocation::default()
    }

    pub(crate) fn arg<S: Into<OsString>>(&mut self, arg: S) -> &mut Self {
        self.args.push(arg.into());
        self
    }

    pub(crate) fn stdin(&mut self, data: &Data) -> &mut Self {
        self.stdin = Some(data.clone());
        self
    }

    pub(crate) fn stdout(&mut self, data: &Data) -> &mut Self {
        self.stdout = Some(Output::Data(data.clone()));
        self
    }

    /// Splits standard output into lines for the colon line handler.
    pub(crate) fn colon_lines(&mut self) -> &mut Self {
        self.stdout = Some(Output::ColonLines);
        self
    }

    /// Passes data through an extra descriptor.
    ///
    /// Returns the special file name (`-&N`) referring to it.
    pub(crate) fn extra_input(&mut self, data: &Data) -> Result<String> {
        let (child, parent) = pipe()?;
        let name = format!("-&{}", child.as_raw_fd());

        self.extra_inputs.push(ExtraInput { data: data.clone(), parent: parent, child: child });
        Ok(name)
    }
}


enum ChannelKind {
    Status,
    Input(Data),
    Output(Data),
    ColonLines,
}


impl ChannelKind {
    fn direction(&self) -> Direction {
        match self {
            ChannelKind::Input(_) => Direction::Write,
            _ => Direction::Read,
        }
    }
}


/// Parent end of one pipe.
struct Channel {
    file: Option<File>,
    tag: Option<IoTag>,
    kind: ChannelKind,

    /// Bytes read from data but not yet written
    pending: Vec<u8>,

    /// Incomplete line
    partial: Vec<u8>,
}


impl Channel {
    fn new(fd: OwnedFd, kind: ChannelKind) -> Result<Self> {
        set_nonblocking(fd.as_raw_fd())?;

        Ok(Channel {
            file: Some(File::from(fd)),
            tag: None,
            kind: kind,
            pending: Vec::new(),
            partial: Vec::new(),
        })
    }

    fn is_open(&self) -> bool {
        self.file.is_some()
    }

    /// Reads once, `Ok(None)` means there is nothing to read right now.
    fn read_chunk(&mut self, buf: &mut [u8]) -> Result<Option<usize>> {
        let Some(file) = self.file.as_mut() else {
            return Ok(Some(0));
        };

        loop {
            match file.read(buf) {
                Ok(count) => return Ok(Some(count)),
                Err(e) if e.kind() == IoErrorKind::Interrupted => continue,
                Err(e) if e.kind() == IoErrorKind::WouldBlock => return Ok(None),
                Err(e) => return Err(e.into()),
            }
        }
    }
}


/// State of one backend process and its pipes.
#[derive(Default)]
pub(crate) struct PipeSession {
    status_handler: Option<StatusHandler>,
    command_handler: Option<CommandHandler>,
    colon_handler: Option<ColonLineHandler>,
    io: Option<Rc<dyn IoCallbacks>>,

    child: Option<Child>,
    command: Option<File>,
    channels: Vec<Channel>,

    /// First failure of the running operation
    error: Option<Error>,
    running: bool,
}


impl PipeSession {
    fn pump(&mut self, index: usize) -> Result<()> {
        match self.channels[index].kind {
            ChannelKind::Status => self.read_status(index),
            ChannelKind::Input(_) => self.write_input(index),
            ChannelKind::Output(_) | ChannelKind::ColonLines => self.read_output(index),
        }
    }

    fn read_status(&mut self, index: usize) -> Result<()> {
        let mut buf = [0u8; CHUNK_SIZE];

        loop {
            match self.channels[index].read_chunk(&mut buf)? {
                None => return Ok(()),

                Some(0) => {
                    let rest = std::mem::take(&mut self.channels[index].partial);
                    if !rest.is_empty() {
                        self.process_status_line(&rest)?;
                    }

                    self.close_channel(index);
                    return self.emit_status(StatusCode::Eof, "");
                }

                Some(count) => {
                    self.channels[index].partial.extend_from_slice(&buf[..count]);
                    while let Some(line) = next_line(&mut self.channels[index].partial) {
                        self.process_status_line(&line)?;
                    }
                }
            }
        }
    }

    fn process_status_line(&mut self, raw: &[u8]) -> Result<()> {
        let line = String::from_utf8_lossy(raw);
        let Some((code, args)) = status::parse_status_line(&line) else {
            return Ok(());
        };

        tracing::trace!(code = code.keyword(), args, "status line");

        if code.is_command_request() {
            if let Some(handler) = self.command_handler.as_mut() {
                let answer = handler(code, args)?;
                return self.send_command(answer.unwrap_or_default());
            }
        }

        self.emit_status(code, args)
    }

    fn emit_status(&mut self, code: StatusCode, args: &str) -> Result<()> {
        match self.status_handler.as_mut() {
            Some(handler) => handler(code, args),
            None => Ok(()),
        }
    }

    fn send_command(&mut self, mut answer: String) -> Result<()> {
        let Some(command) = self.command.as_mut() else {
            tracing::warn!("backend asked for input without a command channel");
            return Ok(());
        };

        answer.push('\n');
        command.write_all(answer.as_bytes())?;
        Ok(())
    }

    fn write_input(&mut self, index: usize) -> Result<()> {
        loop {
            let channel = &mut self.channels[index];
            if channel.pending.is_empty() {
                let ChannelKind::Input(data) = &channel.kind else {
                    return Ok(());
                };

                let mut chunk = vec![0u8; CHUNK_SIZE];
                let count = data.read(&mut chunk);
                if 0 == count {
                    self.close_channel(index);
                    return Ok(());
                }

                chunk.truncate(count);
                channel.pending = chunk;
            }

            let Some(file) = channel.file.as_mut() else {
                return Ok(());
            };

            match file.write(&channel.pending) {
                Ok(count) => {
                    channel.pending.drain(..count);
                }

                Err(e) if e.kind() == IoErrorKind::Interrupted => continue,
                Err(e) if e.kind() == IoErrorKind::WouldBlock => return Ok(()),

                //
                // Backend stopped reading, it will tell us why on the status channel
                //

                Err(e) if e.kind() == IoErrorKind::BrokenPipe => {
                    self.close_channel(index);
                    return Ok(());
                }

                Err(e) => return Err(e.into()),
            }
        }
    }

    fn read_output(&mut self, index: usize) -> Result<()> {
        let mut buf = [0u8; CHUNK_SIZE];

        loop {
            let Some(count) = self.channels[index].read_chunk(&mut buf)? else {
                return Ok(());
            };

            if let ChannelKind::Output(data) = &self.channels[index].kind {
                if 0 == count {
                    self.close_channel(index);
                    return Ok(());
                }

                data.write(&buf[..count]);
                continue;
            }

            if 0 == count {
                let rest = std::mem::take(&mut self.channels[index].partial);
                if !rest.is_empty() {
                    self.emit_colon_line(Some(&rest))?;
                }

                self.close_channel(index);
                return self.emit_colon_line(None);
            }

            self.channels[index].partial.extend_from_slice(&buf[..count]);
            while let Some(line) = next_line(&mut self.channels[index].partial) {
                self.emit_colon_line(Some(&line))?;
            }
        }
    }

    fn emit_colon_line(&mut self, raw: Option<&[u8]>) -> Result<()> {
        let Some(handler) = self.colon_handler.as_mut() else {
            return Ok(());
        };

        match raw {
            Some(raw) => handler(Some(&String::from_utf8_lossy(raw))),
            None => handler(None),
        }
    }

    fn close_channel(&mut self, index: usize) {
        let channel = &mut self.channels[index];
        channel.file = None;

        if let (Some(tag), Some(io)) = (channel.tag.take(), self.io.as_ref()) {
            io.remove(tag);
        }
    }

    fn close_all(&mut self) {
        for index in 0..self.channels.len() {
            self.close_channel(index);
        }

        self.command = None;
    }

    fn kill_child(&mut self) {
        if let Some(child) = self.child.as_mut() {
            let _ = child.kill();
        }
    }

    fn abort(&mut self, err: Error) {
        tracing::debug!(error = %err, "aborting backend operation");

        if self.error.is_none() {
            self.error = Some(err);
        }

        self.kill_child();
        self.close_all();
    }

    /// Reaps the backend once every pipe is closed.
    ///
    /// Returns the callbacks to notify and the final outcome.
    fn finish_if_drained(&mut self) -> Option<(Rc<dyn IoCallbacks>, Result<()>)> {
        if !self.running || self.channels.iter().any(Channel::is_open) {
            return None;
        }

        self.running = false;
        self.command = None;

        if let Some(child) = self.child.take() {
            reap(child);
        }

        let outcome = match self.error.take() {
            Some(err) => Err(err),
            None => Ok(()),
        };

        self.io
            .clone()
            .map(|io| (io, outcome))
    }

    fn dispatch(session: &Rc<RefCell<PipeSession>>, index: usize) -> Result<()> {
        let finished = {
            let mut this = session.borrow_mut();
            if let Err(err) = this.pump(index) {
                this.abort(err);
            }

            this.finish_if_drained()
        };

        if let Some((io, outcome)) = finished {
            io.event(IoEvent::Done(outcome));
        }

        Ok(())
    }

    /// Terminates a running backend without reporting completion.
    fn shutdown(&mut self) {
        if self.running {
            tracing::debug!("abandoning running backend");

            self.kill_child();
            self.close_all();
            self.running = false;

            if let Some(child) = self.child.take() {
                reap(child);
            }
        }

        self.status_handler = None;
        self.command_handler = None;
        self.colon_handler = None;
    }
}


/// Process-based engine shared by the `gpg` and `gpgsm` backends.
pub(crate) struct PipeEngine {
    session: Rc<RefCell<PipeSession>>,
    program: PathBuf,

    /// Arguments preceding every invocation
    base_args: Vec<OsString>,
}


impl PipeEngine {
    /// Creates an engine running `program`.
    ///
    /// * `program` - path to the backend
    /// * `base_args` - options passed to every run
    pub(crate) fn new(program: &Path, base_args: Vec<OsString>) -> Self {
        PipeEngine {
            session: Rc::new(RefCell::new(PipeSession::default())),
            program: program.to_owned(),
            base_args: base_args,
        }
    }

    pub(crate) fn set_status_handler(&mut self, handler: StatusHandler) {
        self.session
            .borrow_mut()
            .status_handler = Some(handler);
    }

    pub(crate) fn set_command_handler(&mut self, handler: CommandHandler) {
        self.session
            .borrow_mut()
            .command_handler = Some(handler);
    }

    pub(crate) fn set_colon_line_handler(&mut self, handler: ColonLineHandler) {
        self.session
            .borrow_mut()
            .colon_handler = Some(handler);
    }

    pub(crate) fn set_io_callbacks(&mut self, io: Rc<dyn IoCallbacks>) {
        self.session
            .borrow_mut()
            .io = Some(io);
    }

    pub(crate) fn has_command_handler(&self) -> bool {
        self.session
            .borrow()
            .command_handler
            .is_some()
    }

    /// Drops the handlers once the context has observed completion.
    pub(crate) fn io_event(&mut self, event: &IoEvent) {
        if let IoEvent::Done(_) = event {
            let mut session = self.session.borrow_mut();
            if !session.running {
                session.status_handler = None;
                session.command_handler = None;
                session.colon_handler = None;
            }
        }
    }

    /// Spawns the backend and registers its pipes with the event loop.
    ///
    /// * `invocation` - operation specific arguments and data
    pub(crate) fn run(&mut self, invocation: Invocation) -> Result<()> {
        let io = {
            let session = self.session.borrow();
            if session.running {
                return Err(Error::invalid_value("Engine is already running an operation"));
            }

            session.io
                .clone()
                .ok_or_else(|| Error::invalid_value("Engine has no event loop callbacks"))?
        };

        let Invocation { args, stdin, stdout, extra_inputs } = invocation;

        let (status_read, status_write) = pipe()?;
        let mut inherited = vec![status_write.as_raw_fd()];

        let mut command = Command::new(&self.program);
        command.args(&self.base_args)
            .arg("--status-fd")
            .arg(status_write.as_raw_fd().to_string());

        let command_pipe = if self.has_command_handler() {
            let (read, write) = pipe()?;
            inherited.push(read.as_raw_fd());
            command.arg("--command-fd")
                .arg(read.as_raw_fd().to_string());

            Some((read, write))
        } else {
            command.arg("--batch");
            None
        };

        inherited.extend(extra_inputs.iter().map(|extra| extra.child.as_raw_fd()));
        command.args(&args);

        let mut channels = vec![Channel::new(status_read, ChannelKind::Status)?];

        match stdin {
            Some(data) => {
                let (read, write) = pipe()?;
                command.stdin(Stdio::from(read));
                channels.push(Channel::new(write, ChannelKind::Input(data))?);
            }
            None => {
                command.stdin(Stdio::null());
            }
        }

        match stdout {
            Some(output) => {
                let (read, write) = pipe()?;
                command.stdout(Stdio::from(write));

                let kind = match output {
                    Output::Data(data) => ChannelKind::Output(data),
                    Output::ColonLines => ChannelKind::ColonLines,
                };

                channels.push(Channel::new(read, kind)?);
            }
            None => {
                command.stdout(Stdio::null());
            }
        }

        command.stderr(Stdio::null());

        let mut child_ends = Vec::new();
        for extra in extra_inputs {
            channels.push(Channel::new(extra.parent, ChannelKind::Input(extra.data))?);
            child_ends.push(extra.child);
        }

        unsafe {
            command.pre_exec(move || {
                for fd in inherited.iter() {
                    if -1 == libc::fcntl(*fd, libc::F_SETFD, 0) {
                        return Err(std::io::Error::last_os_error());
                    }
                }

                Ok(())
            });
        }

        let child = command.spawn()?;
        tracing::debug!(program = %self.program.display(), ?args, pid = child.id(), "spawned backend");

        //
        // Child ends belong to the backend now
        //

        drop(command);
        drop(status_write);
        drop(child_ends);

        let command_file = command_pipe.map(|(read, write)| {
            drop(read);
            File::from(write)
        });

        let watches: Vec<(usize, RawFd, Direction)> = channels
            .iter()
            .enumerate()
            .filter_map(|(index, channel)| channel.file
                .as_ref()
                .map(|file| (index, file.as_raw_fd(), channel.kind.direction())))
            .collect();

        {
            let mut session = self.session.borrow_mut();
            session.child = Some(child);
            session.command = command_file;
            session.channels = channels;
            session.error = None;
            session.running = true;
        }

        for (index, fd, dir) in watches {
            let weak = Rc::downgrade(&self.session);
            let handler: IoHandler = Box::new(move || match weak.upgrade() {
                Some(session) => PipeSession::dispatch(&session, index),
                None => Ok(()),
            });

            match io.add(fd, dir, handler) {
                Ok(tag) => self.session.borrow_mut().channels[index].tag = Some(tag),
                Err(err) => {
                    self.session.borrow_mut().shutdown();
                    return Err(err);
                }
            }
        }

        io.event(IoEvent::Start);
        Ok(())
    }
}


impl Drop for PipeEngine {
    fn drop(&mut self) {
        if let Ok(mut session) = self.session.try_borrow_mut() {
            session.shutdown();
        }
    }
}
