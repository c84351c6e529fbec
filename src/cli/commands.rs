// CLI command implementations
use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::{Path, PathBuf};

use anyhow::{bail, Context};
use glob::glob;
use tracing::info;

use oggplex::{Demuxer, OggError, PacketWriteEndInfo, PacketWriter, PageReader, WriterConfig};

use crate::cli::output::{OutputFormatter, PacketRow, PageRow, SummaryRow};

/// Expand file arguments, treating each one as a glob pattern.
///
/// A pattern without wildcards that matches nothing is kept as-is so the
/// open error names the missing file.
pub fn expand_inputs(patterns: &[String]) -> anyhow::Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for pattern in patterns {
        let has_wildcard = pattern.contains(['*', '?', '[']);
        let mut matched = false;
        for entry in glob(pattern).with_context(|| format!("invalid glob pattern: {}", pattern))? {
            let path = entry?;
            if path.is_file() {
                files.push(path);
                matched = true;
            }
        }
        if !matched && !has_wildcard {
            files.push(PathBuf::from(pattern));
        }
    }
    if files.is_empty() {
        bail!("no input files matched");
    }
    Ok(files)
}

fn open_input(path: &Path) -> anyhow::Result<BufReader<File>> {
    let file = File::open(path).with_context(|| format!("cannot open {}", path.display()))?;
    Ok(BufReader::new(file))
}

/// List pages. Returns the number of damaged or unreadable spots found.
pub fn command_pages(files: &[String], formatter: &OutputFormatter) -> anyhow::Result<u64> {
    let mut problems = 0;
    for path in expand_inputs(files)? {
        let mut reader = PageReader::new(open_input(&path)?);
        let name = path.display();
        formatter.print_info(&format!("{}", name));

        let mut pages = 0u64;
        loop {
            match reader.read_page() {
                Ok(Some(page)) => {
                    let offset = reader.offset() - page.encoded_len() as u64;
                    formatter.emit(&PageRow::new(&page, offset))?;
                    pages += 1;
                }
                Ok(None) => break,
                Err(OggError::Sync { offset }) => {
                    let skipped = reader.resync()?;
                    formatter.print_error(&format!(
                        "{}: lost sync at byte {}, skipped {} byte(s)",
                        name, offset, skipped
                    ));
                    problems += 1;
                }
                Err(e) if e.is_recoverable() => {
                    formatter.print_error(&format!("{}: {}", name, e));
                    problems += 1;
                }
                Err(e) => {
                    formatter.print_error(&format!("{}: {}", name, e));
                    problems += 1;
                    break;
                }
            }
        }
        formatter.print_info(&format!("{} page(s)", pages));
    }
    Ok(problems)
}

/// List packets. Returns the number of problems the demuxer reported.
pub fn command_packets(
    files: &[String],
    serial: Option<u32>,
    with_data: bool,
    formatter: &OutputFormatter,
) -> anyhow::Result<u64> {
    let mut total_problems = 0;
    for path in expand_inputs(files)? {
        let mut demuxer = Demuxer::new(open_input(&path)?);
        let name = path.display().to_string();
        let mut problems = 0;
        let mut index = 0u64;

        while let Some(item) = demuxer.next_packet_any_stream() {
            match item {
                Ok(packet) => {
                    if serial.map_or(true, |s| s == packet.stream_serial) {
                        formatter.emit(&PacketRow::new(&packet, index, with_data))?;
                    }
                    index += 1;
                }
                Err(e) => {
                    formatter.print_error(&format!("{}: {}", name, e));
                    problems += 1;
                }
            }
        }

        formatter.emit(&SummaryRow {
            file: &name,
            streams: demuxer.serials(),
            problems,
            stats: demuxer.stats(),
        })?;
        total_problems += problems;
    }
    Ok(total_problems)
}

/// Rewrite `input` into `output` through the demuxer and page writer.
///
/// Page boundaries of the source are kept where a packet ended a page; the
/// segment cap may split pages further. Damaged input is reported and
/// skipped. Returns the number of problems.
pub fn command_remux(
    input: &str,
    output: &str,
    max_segments: u8,
    formatter: &OutputFormatter,
) -> anyhow::Result<u64> {
    let demuxer = Demuxer::new(open_input(Path::new(input))?);
    let sink = File::create(output).with_context(|| format!("cannot create {}", output))?;
    let config = WriterConfig {
        max_segments_per_page: max_segments,
    };
    let mut writer = PacketWriter::with_config(BufWriter::new(sink), config);

    let mut problems = 0;
    let mut packets = 0u64;
    for item in demuxer {
        let packet = match item {
            Ok(packet) => packet,
            Err(e) => {
                formatter.print_error(&format!("{}: {}", input, e));
                problems += 1;
                continue;
            }
        };
        let end_info = if packet.is_eos {
            PacketWriteEndInfo::EndStream
        } else if packet.last_in_page {
            PacketWriteEndInfo::EndPage
        } else {
            PacketWriteEndInfo::NormalPacket
        };
        match writer.write_packet(packet.stream_serial, &packet.data, packet.granule_position, end_info) {
            Ok(()) => packets += 1,
            // A stream reopened in the source stays closed in the output
            Err(e @ OggError::StreamReopened { .. }) => {
                formatter.print_error(&format!("{}: {}", input, e));
                problems += 1;
            }
            Err(e) => return Err(e).with_context(|| format!("writing {}", output)),
        }
    }

    writer
        .flush_all()
        .with_context(|| format!("flushing {}", output))?;
    let pages = writer.pages_written();
    info!(input, output, packets, pages, "remux finished");
    formatter.print_success(&format!(
        "{} -> {}: {} packet(s) in {} page(s)",
        input, output, packets, pages
    ));
    Ok(problems)
}
