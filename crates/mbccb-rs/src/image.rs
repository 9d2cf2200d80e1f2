// src/image.rs

use crate::config::CommParams;
use crate::error::MbccbError;
use crate::schedule::{Command, CommandRecord, InitFrame, InitRecord, Schedule};
use crate::types::{FormatFlags, Function};
use alloc::vec;
use alloc::vec::Vec;
use log::{debug, info};

/// Signature and format version at the start of every image.
pub const SIGNATURE: &[u8; 8] = b"MesaMB01";
pub const HEADER_SIZE: usize = 64;
pub const RECORD_SIZE: usize = 32;

/// A trait for fixed-size structures that can be written to and read from
/// a big-endian byte buffer.
pub trait Codec: Sized {
    const SIZE: usize;

    /// Serializes the object into the start of `buffer`.
    /// Returns the number of bytes written.
    fn serialize(&self, buffer: &mut [u8]) -> Result<usize, MbccbError>;

    /// Deserializes an object from the start of `buffer`.
    fn deserialize(buffer: &[u8]) -> Result<Self, MbccbError>;
}

struct BeWriter<'a> {
    buf: &'a mut [u8],
    pos: usize,
}

impl<'a> BeWriter<'a> {
    // Callers check the buffer length against `Codec::SIZE` first.
    fn new(buf: &'a mut [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    fn put(&mut self, bytes: &[u8]) {
        self.buf[self.pos..self.pos + bytes.len()].copy_from_slice(bytes);
        self.pos += bytes.len();
    }

    fn u8(&mut self, v: u8) {
        self.put(&[v]);
    }

    fn u16(&mut self, v: u16) {
        self.put(&v.to_be_bytes());
    }

    fn u32(&mut self, v: u32) {
        self.put(&v.to_be_bytes());
    }
}

struct BeReader<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> BeReader<'a> {
    fn new(buf: &'a [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    fn take<const N: usize>(&mut self) -> [u8; N] {
        let mut out = [0u8; N];
        out.copy_from_slice(&self.buf[self.pos..self.pos + N]);
        self.pos += N;
        out
    }

    fn u8(&mut self) -> u8 {
        self.take::<1>()[0]
    }

    fn u16(&mut self) -> u16 {
        u16::from_be_bytes(self.take())
    }

    fn u32(&mut self) -> u32 {
        u32::from_be_bytes(self.take())
    }
}

fn check_len(buffer_len: usize, needed: usize) -> Result<(), MbccbError> {
    if buffer_len < needed {
        return Err(MbccbError::BufferTooShort {
            needed,
            actual: buffer_len,
        });
    }
    Ok(())
}

/// Converts a length or offset into the width of its binary field.
fn fit<T: TryFrom<usize>>(field: &'static str, value: usize) -> Result<T, MbccbError> {
    T::try_from(value).map_err(|_| MbccbError::FieldOverflow { field, value })
}

/// The 64-byte image header.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Header {
    pub baudrate: u32,
    pub format: FormatFlags,
    pub txdelay: u16,
    pub rxdelay: u16,
    pub drivedelay: u16,
    pub icdelay: u16,
    /// Byte length of the init record table.
    pub init_len: u32,
    /// Byte length of the command record table.
    pub cmds_len: u32,
    /// Byte length of the data blob.
    pub data_len: u32,
}

impl Header {
    /// A header for `params` with empty sections.
    pub fn new(params: &CommParams) -> Self {
        Self {
            baudrate: params.baudrate,
            format: params.format_flags(),
            txdelay: params.txdelay,
            rxdelay: params.rxdelay,
            drivedelay: params.drivedelay,
            icdelay: params.icdelay,
            ..Self::default()
        }
    }
}

impl Codec for Header {
    const SIZE: usize = HEADER_SIZE;

    fn serialize(&self, buffer: &mut [u8]) -> Result<usize, MbccbError> {
        check_len(buffer.len(), Self::SIZE)?;
        let mut w = BeWriter::new(buffer);
        w.put(SIGNATURE);
        w.u32(self.baudrate);
        w.u16(self.format.bits());
        w.u16(self.txdelay);
        w.u16(self.rxdelay);
        w.u16(self.drivedelay);
        w.u16(self.icdelay);
        w.u16(0);
        w.put(&[0u8; 28]);
        w.u32(self.init_len);
        w.u32(self.cmds_len);
        w.u32(self.data_len);
        Ok(w.pos)
    }

    fn deserialize(buffer: &[u8]) -> Result<Self, MbccbError> {
        check_len(buffer.len(), Self::SIZE)?;
        let mut r = BeReader::new(buffer);
        if &r.take::<8>() != SIGNATURE {
            return Err(MbccbError::BadSignature);
        }
        let baudrate = r.u32();
        let format = FormatFlags(r.u16());
        let txdelay = r.u16();
        let rxdelay = r.u16();
        let drivedelay = r.u16();
        let icdelay = r.u16();
        r.u16();
        r.take::<28>();
        Ok(Self {
            baudrate,
            format,
            txdelay,
            rxdelay,
            drivedelay,
            icdelay,
            init_len: r.u32(),
            cmds_len: r.u32(),
            data_len: r.u32(),
        })
    }
}

/// One 32-byte entry of the init or command table.
///
/// Meta records (function 0) reuse the fields: `address` is the meta
/// command, `pin_count`/`reg_count` carry rx/tx delays and `timeout` the
/// delay or the baudrate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Record {
    pub mbid: u8,
    pub function: u8,
    pub flags: u16,
    pub address: u16,
    pub pin_count: u16,
    pub reg_count: u16,
    pub drive_delay: u16,
    pub ic_delay: u32,
    pub type_ptr: u32,
    pub interval: u32,
    pub timeout: u32,
    pub data_ptr: u32,
}

impl Record {
    pub const META_DELAY: u16 = 0;
    pub const META_COMMS: u16 = 1;

    pub fn delay(micros: u32) -> Self {
        Self {
            address: Self::META_DELAY,
            timeout: micros,
            ..Self::default()
        }
    }

    pub fn comms(params: &CommParams) -> Self {
        Self {
            flags: params.override_flags().bits(),
            address: Self::META_COMMS,
            pin_count: params.rxdelay,
            reg_count: params.txdelay,
            drive_delay: params.drivedelay,
            ic_delay: params.icdelay.into(),
            timeout: params.baudrate,
            ..Self::default()
        }
    }

    pub fn is_meta(&self) -> bool {
        self.function == 0
    }
}

impl Codec for Record {
    const SIZE: usize = RECORD_SIZE;

    fn serialize(&self, buffer: &mut [u8]) -> Result<usize, MbccbError> {
        check_len(buffer.len(), Self::SIZE)?;
        let mut w = BeWriter::new(buffer);
        w.u8(self.mbid);
        w.u8(self.function);
        w.u16(self.flags);
        w.u16(self.address);
        w.u16(self.pin_count);
        w.u16(self.reg_count);
        w.u16(self.drive_delay);
        w.u32(self.ic_delay);
        w.u32(self.type_ptr);
        w.u32(self.interval);
        w.u32(self.timeout);
        w.u32(self.data_ptr);
        Ok(w.pos)
    }

    fn deserialize(buffer: &[u8]) -> Result<Self, MbccbError> {
        check_len(buffer.len(), Self::SIZE)?;
        let mut r = BeReader::new(buffer);
        Ok(Self {
            mbid: r.u8(),
            function: r.u8(),
            flags: r.u16(),
            address: r.u16(),
            pin_count: r.u16(),
            reg_count: r.u16(),
            drive_delay: r.u16(),
            ic_delay: r.u32(),
            type_ptr: r.u32(),
            interval: r.u32(),
            timeout: r.u32(),
            data_ptr: r.u32(),
        })
    }
}

/// The variable-length data section.
///
/// Offset 0 is pre-filled so that a zero pointer always means "none".
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataBlob {
    bytes: Vec<u8>,
    fragments: usize,
}

impl Default for DataBlob {
    fn default() -> Self {
        Self::new()
    }
}

impl DataBlob {
    pub fn new() -> Self {
        Self {
            bytes: vec![0],
            fragments: 1,
        }
    }

    /// Appends a fragment and returns its start offset.
    pub fn push(&mut self, fragment: &[u8]) -> Result<u32, MbccbError> {
        let offset = fit("dataptr", self.bytes.len())?;
        self.bytes.extend_from_slice(fragment);
        self.fragments += 1;
        Ok(offset)
    }

    /// Appends `[len, content...]` so that `content` starts on a 4-byte
    /// boundary, padding with a small skip fragment first if needed.
    /// Returns the offset of the length byte.
    pub fn push_aligned(&mut self, content: &[u8]) -> Result<u32, MbccbError> {
        match (self.bytes.len() + 1) % 4 {
            3 => {
                self.push(&[0])?;
            }
            2 => {
                self.push(&[1, 0])?;
            }
            1 => {
                self.push(&[2, 0, 0])?;
            }
            _ => {}
        }
        let mut fragment = Vec::with_capacity(content.len() + 1);
        fragment.push(fit::<u8>("typelen", content.len())?);
        fragment.extend_from_slice(content);
        self.push(&fragment)
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Number of fragments appended, the placeholder included.
    pub fn fragments(&self) -> usize {
        self.fragments
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }
}

/// Packs one-byte coil values into bytes, first coil in bit 0.
fn pack_coils(coils: &[u8]) -> Vec<u8> {
    coils
        .chunks(8)
        .map(|chunk| {
            chunk
                .iter()
                .enumerate()
                .fold(0u8, |acc, (bit, &coil)| acc | ((coil & 1) << bit))
        })
        .collect()
}

/// The wire request of an init frame, prefixed with its length byte.
fn init_packet(frame: &InitFrame) -> Result<Vec<u8>, MbccbError> {
    let mut p = Vec::new();
    let head = |p: &mut Vec<u8>, len: u8| {
        p.push(len);
        p.push(frame.mbid);
        p.push(frame.function.code());
        p.extend_from_slice(&frame.address.to_be_bytes());
    };
    match frame.function {
        Function::WriteCoil | Function::WriteRegister => {
            head(&mut p, 6);
            p.extend_from_slice(&frame.payload);
        }
        Function::WriteCoils => {
            let bits = pack_coils(&frame.payload);
            head(&mut p, fit("packet length", 7 + bits.len())?);
            p.extend_from_slice(&fit::<u16>("coil count", frame.payload.len())?.to_be_bytes());
            p.push(fit("byte count", bits.len())?);
            p.extend_from_slice(&bits);
        }
        Function::WriteRegisters => {
            let len = frame.payload.len();
            head(&mut p, fit("packet length", 7 + len)?);
            p.extend_from_slice(&fit::<u16>("register count", len / 2)?.to_be_bytes());
            p.push(fit("byte count", len)?);
            p.extend_from_slice(&frame.payload);
        }
        Function::ReadCoils
        | Function::ReadInputs
        | Function::ReadRegisters
        | Function::ReadInputRegs => {
            head(&mut p, 6);
            p.extend_from_slice(&frame.count.to_be_bytes());
        }
    }
    Ok(p)
}

/// Writes the pin names and type table of a command into the blob and
/// returns its record.
fn command_record(cmd: &Command, blob: &mut DataBlob) -> Result<Record, MbccbError> {
    let mut data_ptr = 0;
    let mut types = Vec::new();
    for (i, pin) in cmd.pins.iter().enumerate() {
        let mut fragment = Vec::with_capacity(pin.tag.len() + 2);
        fragment.push(fit("pin name length", pin.tag.len() + 1)?);
        fragment.extend_from_slice(pin.tag.as_bytes());
        fragment.push(0);
        let offset = blob.push(&fragment)?;
        if i == 0 {
            data_ptr = offset;
        }
        if cmd.function.is_register() {
            types.extend_from_slice(&[
                pin.modbus_type.code(),
                pin.hal_type.code(),
                pin.flags.bits(),
                fit("register offset", usize::from(pin.offset))?,
            ]);
        }
    }
    let type_ptr = if types.is_empty() {
        0
    } else {
        blob.push_aligned(&types)?
    };

    Ok(Record {
        mbid: cmd.mbid,
        function: cmd.function.code(),
        flags: cmd.flags.bits(),
        address: cmd.address,
        pin_count: cmd.count,
        reg_count: cmd.registers,
        type_ptr,
        interval: cmd.interval,
        timeout: cmd.timeout,
        data_ptr,
        ..Record::default()
    })
}

/// A serialized schedule: header, init table, command table and data blob.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Image {
    header: Header,
    bytes: Vec<u8>,
    init_records: usize,
    command_records: usize,
    pins: usize,
    data_fragments: usize,
}

impl Image {
    /// Lays out `schedule` as an image.
    ///
    /// # Errors
    /// Returns `MbccbError::FieldOverflow` if a length or offset does not fit
    /// its binary field.
    pub fn build(schedule: &Schedule) -> Result<Self, MbccbError> {
        let mut blob = DataBlob::new();

        // 1. Init table, with the pre-built request packets in the blob.
        let mut init = Vec::with_capacity(schedule.init.len());
        for record in &schedule.init {
            let entry = match record {
                InitRecord::Delay(us) => Record::delay(*us),
                InitRecord::CommsOverride(params) => Record::comms(params),
                InitRecord::Frame(frame) => {
                    let packet = init_packet(frame)?;
                    debug!("Init packet {}: {}", init.len() + 1, hex::encode(&packet));
                    Record {
                        mbid: frame.mbid,
                        function: frame.function.code(),
                        flags: frame.flags.bits(),
                        address: frame.address,
                        timeout: frame.timeout,
                        data_ptr: blob.push(&packet)?,
                        ..Record::default()
                    }
                }
            };
            init.push(entry);
        }

        // 2. Command table, pin names and type tables in the blob.
        let mut cmds = Vec::with_capacity(schedule.commands.len());
        for record in &schedule.commands {
            cmds.push(match record {
                CommandRecord::Delay(us) => Record::delay(*us),
                CommandRecord::Command(cmd) => command_record(cmd, &mut blob)?,
            });
        }

        // 3. Header and concatenation.
        let header = Header {
            init_len: fit("initlen", init.len() * RECORD_SIZE)?,
            cmds_len: fit("cmdslen", cmds.len() * RECORD_SIZE)?,
            data_len: fit("datalen", blob.len())?,
            ..Header::new(&schedule.params)
        };
        let total = HEADER_SIZE + (init.len() + cmds.len()) * RECORD_SIZE + blob.len();
        let mut bytes = vec![0u8; total];
        let mut pos = header.serialize(&mut bytes)?;
        for record in init.iter().chain(cmds.iter()) {
            pos += record.serialize(&mut bytes[pos..])?;
        }
        bytes[pos..].copy_from_slice(blob.as_bytes());

        let pins = schedule.pin_count();
        let image = Self {
            header,
            bytes,
            init_records: init.len(),
            command_records: cmds.len(),
            pins,
            data_fragments: blob.fragments().saturating_sub(pins),
        };
        info!(
            "Image: {} inits, {} commands, {} pins, {} data fragments, {} bytes",
            image.init_records,
            image.command_records,
            image.pins,
            image.data_fragments,
            image.len()
        );
        Ok(image)
    }

    pub fn header(&self) -> &Header {
        &self.header
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.bytes
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    pub fn init_records(&self) -> usize {
        self.init_records
    }

    pub fn command_records(&self) -> usize {
        self.command_records
    }

    pub fn pin_count(&self) -> usize {
        self.pins
    }

    /// Data fragments other than pin names.
    pub fn data_fragments(&self) -> usize {
        self.data_fragments
    }

    /// Decodes the `index`th init record.
    pub fn init_record(&self, index: usize) -> Option<Record> {
        (index < self.init_records)
            .then(|| self.record_at(HEADER_SIZE + index * RECORD_SIZE))
            .flatten()
    }

    /// Decodes the `index`th command record.
    pub fn command_record(&self, index: usize) -> Option<Record> {
        (index < self.command_records)
            .then(|| {
                self.record_at(HEADER_SIZE + (self.init_records + index) * RECORD_SIZE)
            })
            .flatten()
    }

    fn record_at(&self, offset: usize) -> Option<Record> {
        self.bytes
            .get(offset..)
            .and_then(|b| Record::deserialize(b).ok())
    }

    /// The data blob; record pointers are offsets into this slice.
    pub fn data(&self) -> &[u8] {
        let start = HEADER_SIZE + (self.init_records + self.command_records) * RECORD_SIZE;
        self.bytes.get(start..).unwrap_or_default()
    }
}
