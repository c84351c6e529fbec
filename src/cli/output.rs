// Output formatting for CLI

use std::fmt;

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde::Serialize;

use oggplex::{DemuxStats, Packet, Page};

use crate::cli::config::OutputFormat;

/// Format and output data
pub struct OutputFormatter {
    format: OutputFormat,
    quiet: bool,
}

impl OutputFormatter {
    pub fn new(format: OutputFormat, quiet: bool) -> Self {
        Self { format, quiet }
    }

    /// Output one listing row
    pub fn emit<T: Serialize + fmt::Display>(&self, row: &T) -> anyhow::Result<()> {
        match self.format {
            OutputFormat::Pretty => println!("{}", row),
            OutputFormat::Json => println!("{}", serde_json::to_string(row)?),
        }
        Ok(())
    }

    /// Print success message
    pub fn print_success(&self, message: &str) {
        if !self.quiet {
            println!("✓ {}", message);
        }
    }

    /// Print error message
    pub fn print_error(&self, message: &str) {
        eprintln!("✗ {}", message);
    }

    /// Print info message
    pub fn print_info(&self, message: &str) {
        if !self.quiet && self.format == OutputFormat::Pretty {
            println!("  {}", message);
        }
    }
}

fn flag_string(continued: bool, bos: bool, eos: bool) -> String {
    let mut flags = String::new();
    flags.push(if continued { 'c' } else { '-' });
    flags.push(if bos { 'b' } else { '-' });
    flags.push(if eos { 'e' } else { '-' });
    flags
}

#[derive(Debug, Serialize)]
pub struct PageRow {
    pub offset: u64,
    pub serial: u32,
    pub sequence: u32,
    pub granule: i64,
    pub continued: bool,
    pub bos: bool,
    pub eos: bool,
    pub segments: usize,
    pub packets: usize,
    pub bytes: usize,
    pub checksum: u32,
}

impl PageRow {
    pub fn new(page: &Page, offset: u64) -> Self {
        PageRow {
            offset,
            serial: page.serial_number,
            sequence: page.sequence_number,
            granule: page.granule_position,
            continued: page.is_continued(),
            bos: page.is_bos(),
            eos: page.is_eos(),
            segments: page.segment_table.len(),
            packets: page.completed_packets(),
            bytes: page.encoded_len(),
            checksum: page.checksum,
        }
    }
}

impl fmt::Display for PageRow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "@{:<10} serial={:08X} seq={:<6} granule={:<12} {} segments={:<3} packets={:<3} bytes={:<6} crc={:08X}",
            self.offset,
            self.serial,
            self.sequence,
            self.granule,
            flag_string(self.continued, self.bos, self.eos),
            self.segments,
            self.packets,
            self.bytes,
            self.checksum
        )
    }
}

#[derive(Debug, Serialize)]
pub struct PacketRow {
    pub serial: u32,
    pub index: u64,
    pub length: usize,
    pub granule: i64,
    pub bos: bool,
    pub eos: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<String>,
}

impl PacketRow {
    pub fn new(packet: &Packet, index: u64, with_data: bool) -> Self {
        PacketRow {
            serial: packet.stream_serial,
            index,
            length: packet.len(),
            granule: packet.granule_position,
            bos: packet.is_bos,
            eos: packet.is_eos,
            data: with_data.then(|| STANDARD.encode(&packet.data)),
        }
    }
}

impl fmt::Display for PacketRow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "serial={:08X} #{:<6} len={:<7} granule={:<12} {}",
            self.serial,
            self.index,
            self.length,
            self.granule,
            flag_string(false, self.bos, self.eos)
        )?;
        if let Some(data) = &self.data {
            write!(f, " data={}", data)?;
        }
        Ok(())
    }
}

#[derive(Debug, Serialize)]
pub struct SummaryRow<'a> {
    pub file: &'a str,
    pub streams: Vec<u32>,
    pub problems: u64,
    #[serde(flatten)]
    pub stats: &'a DemuxStats,
}

impl fmt::Display for SummaryRow<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let streams: Vec<String> = self.streams.iter().map(|s| format!("{:08X}", s)).collect();
        write!(
            f,
            "{}: {} stream(s) [{}], {} pages, {} packets, {} problem(s), {} lost page(s), {} checksum failure(s), {} byte(s) skipped",
            self.file,
            self.streams.len(),
            streams.join(", "),
            self.stats.pages,
            self.stats.packets,
            self.problems,
            self.stats.lost_pages,
            self.stats.checksum_failures,
            self.stats.bytes_skipped
        )
    }
}
