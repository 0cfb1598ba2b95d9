//! Command-line tool for tar archives.
//!
//! `tarctl` lists, prints, creates, appends to and deletes from ustar
//! archives. Directories given to `create` and `append` are added as
//! directory entries; their contents are not walked.

use std::{
    fs::{self, File, OpenOptions},
    io::{self, Write},
    path::{Path, PathBuf},
    time::UNIX_EPOCH,
};

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use log::{debug, info};

use tar_archive::{Archive, ArchiveReader, Entry, Mode, NameEncoding, NewEntry, TarOptions};

/// tarctl
#[derive(Debug, Parser)]
#[clap(name = "tarctl", version)]
pub struct App {
    /// Character set of entry names
    #[clap(long, value_enum, default_value_t = Encoding::Ascii)]
    encoding: Encoding,

    #[clap(subcommand)]
    cmd: Command,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, ValueEnum, Default)]
enum Encoding {
    #[default]
    Ascii,
    Utf8,
    Latin1,
}

impl From<Encoding> for NameEncoding {
    fn from(encoding: Encoding) -> Self {
        match encoding {
            Encoding::Ascii => NameEncoding::Ascii,
            Encoding::Utf8 => NameEncoding::Utf8,
            Encoding::Latin1 => NameEncoding::Latin1,
        }
    }
}

#[derive(Debug, Subcommand)]
enum Command {
    /// List the entries of an archive
    List {
        /// Show type, mode, owner, size and mtime
        #[clap(short, long)]
        long: bool,
        /// Archive path, or '-' to stream from stdin
        archive: PathBuf,
    },
    /// Write the content of entries to stdout
    Cat {
        archive: PathBuf,
        /// Full names of the entries to print
        #[clap(required = true)]
        paths: Vec<String>,
    },
    /// Create a new archive from files, replacing any existing one
    Create {
        archive: PathBuf,
        /// Files, directories and symlinks to add
        files: Vec<PathBuf>,
    },
    /// Add files to the end of an existing archive
    Append {
        archive: PathBuf,
        #[clap(required = true)]
        files: Vec<PathBuf>,
    },
    /// Delete entries from an archive
    Delete {
        archive: PathBuf,
        /// Full names of the entries to delete
        #[clap(required = true)]
        paths: Vec<String>,
    },
}

fn options(app: &App, mode: Mode) -> TarOptions {
    TarOptions {
        mode,
        name_encoding: app.encoding.into(),
        ..Default::default()
    }
}

fn type_char(entry: &Entry) -> char {
    if entry.is_dir() {
        'd'
    } else if entry.is_symlink() {
        'l'
    } else if entry.is_hard_link() {
        'h'
    } else if entry.is_char_device() {
        'c'
    } else if entry.is_block_device() {
        'b'
    } else if entry.is_fifo() {
        'p'
    } else {
        '-'
    }
}

fn print_entry(out: &mut impl Write, entry: &Entry, long: bool) -> Result<()> {
    if !long {
        writeln!(out, "{}", entry.full_name())?;
        return Ok(());
    }
    write!(
        out,
        "{}{:04o} {}/{} {:>10} {:>12} {}",
        type_char(entry),
        entry.mode() & 0o7777,
        entry.uid(),
        entry.gid(),
        entry.length(),
        entry.mtime(),
        entry.full_name()
    )?;
    if entry.is_symlink() || entry.is_hard_link() {
        write!(out, " -> {}", entry.link_name())?;
    }
    writeln!(out)?;
    Ok(())
}

fn list(app: &App, archive: &Path, long: bool, out: &mut impl Write) -> Result<()> {
    if archive == Path::new("-") {
        let mut reader = ArchiveReader::new(io::stdin().lock(), options(app, Mode::Read))?;
        while let Some(entry) = reader.next_entry()? {
            print_entry(out, entry, long)?;
        }
        return Ok(());
    }

    let file = File::open(archive).with_context(|| format!("opening {archive:?}"))?;
    let mut archive = Archive::open_read_only(file, options(app, Mode::Read))?;
    for entry in archive.entries()? {
        print_entry(out, entry, long)?;
    }
    Ok(())
}

fn cat(app: &App, archive: &Path, paths: &[String], out: &mut impl Write) -> Result<()> {
    let file = File::open(archive).with_context(|| format!("opening {archive:?}"))?;
    let mut archive = Archive::open_read_only(file, options(app, Mode::Read))?;
    for path in paths {
        let Some(entry) = archive.get_entry(path)? else {
            bail!("{path}: not found in archive");
        };
        let id = entry.id();
        io::copy(&mut archive.open_entry(id)?, out)?;
    }
    Ok(())
}

/// Describe a file on disk as a new entry. Symlinks are stored, not
/// followed.
fn new_entry(path: &Path) -> Result<NewEntry> {
    let name = path
        .to_str()
        .with_context(|| format!("{path:?} is not valid UTF-8"))?
        .trim_start_matches('/');
    let metadata = fs::symlink_metadata(path).with_context(|| format!("reading {path:?}"))?;

    let file_type = metadata.file_type();
    let mut entry = if file_type.is_dir() {
        NewEntry::directory(name)
    } else if file_type.is_symlink() {
        let target = fs::read_link(path)?;
        let target = target
            .to_str()
            .with_context(|| format!("link target of {path:?} is not valid UTF-8"))?;
        NewEntry::symlink(name, target)
    } else if file_type.is_file() {
        NewEntry::file(name, fs::read(path).with_context(|| format!("reading {path:?}"))?)
    } else {
        bail!("{path:?}: unsupported file type");
    };

    if let Ok(mtime) = metadata.modified() {
        if let Ok(since_epoch) = mtime.duration_since(UNIX_EPOCH) {
            entry = entry.mtime(since_epoch.as_secs());
        }
    }
    #[cfg(unix)]
    {
        use std::os::unix::fs::MetadataExt;
        entry = entry
            .mode(metadata.mode() & 0o7777)
            .owner(u64::from(metadata.uid()), u64::from(metadata.gid()));
    }
    Ok(entry)
}

fn add_files(archive: &mut Archive<File>, files: &[PathBuf]) -> Result<()> {
    for path in files {
        let entry = new_entry(path)?;
        debug!("adding {path:?} as {}", entry.path());
        archive.add_entry(entry)?;
    }
    Ok(())
}

fn create(app: &App, archive: &Path, files: &[PathBuf]) -> Result<()> {
    let file = OpenOptions::new()
        .read(true)
        .write(true)
        .create(true)
        .truncate(true)
        .open(archive)
        .with_context(|| format!("creating {archive:?}"))?;
    let mut tar = Archive::open(file, options(app, Mode::Create))?;
    add_files(&mut tar, files)?;
    tar.close()?;
    info!("created {archive:?} with {} entries", files.len());
    Ok(())
}

fn append(app: &App, archive: &Path, files: &[PathBuf]) -> Result<()> {
    let file = OpenOptions::new()
        .read(true)
        .write(true)
        .open(archive)
        .with_context(|| format!("opening {archive:?}"))?;
    let mut tar = Archive::open(file, options(app, Mode::Update))?;
    add_files(&mut tar, files)?;
    tar.close()?;
    Ok(())
}

fn delete(app: &App, archive: &Path, paths: &[String]) -> Result<()> {
    let file = OpenOptions::new()
        .read(true)
        .write(true)
        .open(archive)
        .with_context(|| format!("opening {archive:?}"))?;
    let mut tar = Archive::open(file, options(app, Mode::Update))?;
    for path in paths {
        let Some(entry) = tar.get_entry(path)? else {
            bail!("{path}: not found in archive");
        };
        let id = entry.id();
        tar.delete_entry(id)?;
    }
    tar.close()?;
    Ok(())
}

fn run(app: &App, out: &mut impl Write) -> Result<()> {
    match &app.cmd {
        Command::List { long, archive } => list(app, archive, *long, out),
        Command::Cat { archive, paths } => cat(app, archive, paths, out),
        Command::Create { archive, files } => create(app, archive, files),
        Command::Append { archive, files } => append(app, archive, files),
        Command::Delete { archive, paths } => delete(app, archive, paths),
    }
}

fn main() -> Result<()> {
    env_logger::init();

    let app = App::parse();
    let mut out = io::stdout().lock();
    run(&app, &mut out)?;
    out.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use similar_asserts::assert_eq;

    use super::*;

    fn parse(args: &[&str]) -> App {
        App::try_parse_from(std::iter::once("tarctl").chain(args.iter().copied())).unwrap()
    }

    fn run_to_string(args: &[&str]) -> String {
        let mut out = Vec::new();
        run(&parse(args), &mut out).unwrap();
        String::from_utf8(out).unwrap()
    }

    #[test]
    fn test_parse() {
        let app = parse(&["--encoding", "latin1", "list", "-l", "a.tar"]);
        assert_eq!(app.encoding, Encoding::Latin1);
        assert!(matches!(app.cmd, Command::List { long: true, .. }));

        let app = parse(&["delete", "a.tar", "x", "y"]);
        let Command::Delete { paths, .. } = app.cmd else {
            panic!("expected delete");
        };
        assert_eq!(paths, ["x", "y"]);

        assert!(App::try_parse_from(["tarctl", "cat", "a.tar"]).is_err());
        assert!(App::try_parse_from(["tarctl", "--encoding", "ebcdic", "list", "a"]).is_err());
    }

    #[test]
    fn test_create_list_delete() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        fs::write(root.join("file1.txt"), "AAA").unwrap();
        fs::create_dir(root.join("sub")).unwrap();
        fs::write(root.join("sub/file2.txt"), "BBB").unwrap();

        let archive = root.join("out.tar");
        let archive = archive.to_str().unwrap();
        let file1 = root.join("file1.txt");
        let sub = root.join("sub");
        let file2 = root.join("sub/file2.txt");
        run_to_string(&[
            "create",
            archive,
            file1.to_str().unwrap(),
            sub.to_str().unwrap(),
        ]);
        run_to_string(&["append", archive, file2.to_str().unwrap()]);

        let strip = |p: &Path| p.to_str().unwrap().trim_start_matches('/').to_owned();
        let listing = run_to_string(&["list", archive]);
        assert_eq!(
            listing,
            format!("{}\n{}/\n{}\n", strip(&file1), strip(&sub), strip(&file2))
        );

        let long = run_to_string(&["list", "--long", archive]);
        let first = long.lines().next().unwrap();
        assert!(first.starts_with('-'), "{first}");
        assert!(long.lines().nth(1).unwrap().starts_with('d'));

        assert_eq!(run_to_string(&["cat", archive, &strip(&file2)]), "BBB");

        run_to_string(&["delete", archive, &strip(&file1)]);
        let listing = run_to_string(&["list", archive]);
        assert_eq!(listing, format!("{}/\n{}\n", strip(&sub), strip(&file2)));

        let mut out = Vec::new();
        assert!(run(&parse(&["cat", archive, "missing"]), &mut out).is_err());
    }
}
