//! Modbus RTU master over a byte stream.
//!
//! Frames are generated and checked (CRC, function, payload) by `rmodbus`.
//! This module adds the typed request/response pair the bus speaks, the
//! fixture-specific echo and length checks, and a deadline-bounded reader.
use std::io::{Read, Write};
use std::time::{Duration, Instant};

use rmodbus::client::ModbusRequest;
use rmodbus::{ErrorKind, ModbusProto};
use tracing::trace;
use trak_traits::RegisterBus;

use crate::error::{HwError, Result};

pub const FC_READ_COILS: u8 = 0x01;
pub const FC_READ_HOLDING_REGISTERS: u8 = 0x03;
pub const FC_WRITE_SINGLE_COIL: u8 = 0x05;
pub const FC_WRITE_SINGLE_REGISTER: u8 = 0x06;

const EXCEPTION_FLAG: u8 = 0x80;
const EXCEPTION_FRAME_LEN: usize = 5;
/// Slave, function and the echoed address/value words of a write.
const WRITE_ECHO_LEN: usize = 6;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Request {
    ReadCoils { address: u16, count: u16 },
    ReadHoldingRegisters { address: u16, count: u16 },
    WriteSingleCoil { address: u16, on: bool },
    WriteSingleRegister { address: u16, value: u16 },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Response {
    Coils(Vec<bool>),
    Registers(Vec<u16>),
    WriteAck,
}

impl Request {
    pub fn function(&self) -> u8 {
        match self {
            Request::ReadCoils { .. } => FC_READ_COILS,
            Request::ReadHoldingRegisters { .. } => FC_READ_HOLDING_REGISTERS,
            Request::WriteSingleCoil { .. } => FC_WRITE_SINGLE_COIL,
            Request::WriteSingleRegister { .. } => FC_WRITE_SINGLE_REGISTER,
        }
    }

    /// Load this request into `mreq` and append its RTU frame to `frame`.
    fn generate(&self, mreq: &mut ModbusRequest, frame: &mut Vec<u8>) -> Result<()> {
        let generated = match *self {
            Request::ReadCoils { address, count } => mreq.generate_get_coils(address, count, frame),
            Request::ReadHoldingRegisters { address, count } => {
                mreq.generate_get_holdings(address, count, frame)
            }
            Request::WriteSingleCoil { address, on } => mreq.generate_set_coil(address, on, frame),
            Request::WriteSingleRegister { address, value } => {
                mreq.generate_set_holding(address, value, frame)
            }
        };
        generated.map_err(|e| HwError::Frame(format!("cannot encode {self:?}: {e:?}")))
    }

    /// Full RTU frame for this request, CRC appended low byte first.
    pub fn encode(&self, slave: u8) -> Result<Vec<u8>> {
        let mut mreq = ModbusRequest::new(slave, ModbusProto::Rtu);
        let mut frame = Vec::with_capacity(8);
        self.generate(&mut mreq, &mut frame)?;
        Ok(frame)
    }

    /// Length of a successful response frame, CRC included.
    pub fn response_len(&self) -> usize {
        match *self {
            Request::ReadCoils { count, .. } => 5 + usize::from(count).div_ceil(8),
            Request::ReadHoldingRegisters { count, .. } => 5 + 2 * usize::from(count),
            Request::WriteSingleCoil { .. } | Request::WriteSingleRegister { .. } => 8,
        }
    }

    /// Payload bytes a read response must declare.
    fn payload_len(&self) -> Option<usize> {
        match *self {
            Request::ReadCoils { count, .. } => Some(usize::from(count).div_ceil(8)),
            Request::ReadHoldingRegisters { count, .. } => Some(2 * usize::from(count)),
            Request::WriteSingleCoil { .. } | Request::WriteSingleRegister { .. } => None,
        }
    }
}

/// Validate and decode a response frame for `req`.
pub fn decode_response(req: &Request, slave: u8, frame: &[u8]) -> Result<Response> {
    let mut mreq = ModbusRequest::new(slave, ModbusProto::Rtu);
    let mut sent = Vec::with_capacity(8);
    req.generate(&mut mreq, &mut sent)?;
    parse_response(&mreq, req, slave, &sent, frame)
}

/// Parse `frame` against the request `mreq` was last loaded with (`sent`).
fn parse_response(
    mreq: &ModbusRequest,
    req: &Request,
    slave: u8,
    sent: &[u8],
    frame: &[u8],
) -> Result<Response> {
    if frame.len() < EXCEPTION_FRAME_LEN {
        return Err(HwError::Frame(format!("short frame ({} bytes)", frame.len())));
    }
    let parsed = match *req {
        Request::ReadCoils { .. } => {
            let mut bits = Vec::new();
            mreq.parse_bool(frame, &mut bits).map(|()| Response::Coils(bits))
        }
        Request::ReadHoldingRegisters { .. } => {
            let mut words = Vec::new();
            mreq.parse_u16(frame, &mut words).map(|()| Response::Registers(words))
        }
        Request::WriteSingleCoil { .. } | Request::WriteSingleRegister { .. } => {
            mreq.parse_ok(frame).map(|()| Response::WriteAck)
        }
    };
    let response = parsed.map_err(|e| classify(req, slave, frame, e))?;
    check_slave(slave, frame)?;
    check_header(req, frame)?;

    match &response {
        Response::Coils(bits) => expect_items(req, bits.len())?,
        Response::Registers(words) => expect_items(req, words.len())?,
        Response::WriteAck => {
            if frame.get(..WRITE_ECHO_LEN) != sent.get(..WRITE_ECHO_LEN) {
                return Err(HwError::Frame("write echo does not match request".into()));
            }
        }
    }
    Ok(response)
}

/// Slave id, exception flag and function code, in that order.
fn check_header(req: &Request, frame: &[u8]) -> Result<()> {
    let function = req.function();
    if frame[1] == function | EXCEPTION_FLAG {
        return Err(HwError::Exception {
            function,
            code: frame[2],
        });
    }
    if frame[1] != function {
        return Err(HwError::Frame(format!(
            "function {:#04x} in response to {function:#04x}",
            frame[1]
        )));
    }
    if let Some(expected) = req.payload_len() {
        let declared = usize::from(frame[2]);
        let carried = frame.len().saturating_sub(5);
        if declared != expected || carried != declared {
            return Err(HwError::Frame(format!(
                "byte count {declared} (frame carries {carried}), expected {expected}"
            )));
        }
    }
    Ok(())
}

fn check_slave(slave: u8, frame: &[u8]) -> Result<()> {
    if frame[0] != slave {
        return Err(HwError::Frame(format!(
            "response from slave {} while talking to {slave}",
            frame[0]
        )));
    }
    Ok(())
}

fn expect_items(req: &Request, got: usize) -> Result<()> {
    let want = match *req {
        Request::ReadCoils { count, .. } | Request::ReadHoldingRegisters { count, .. } => {
            usize::from(count)
        }
        Request::WriteSingleCoil { .. } | Request::WriteSingleRegister { .. } => return Ok(()),
    };
    if got != want {
        return Err(HwError::Frame(format!("{got} items in response, expected {want}")));
    }
    Ok(())
}

/// Map an `rmodbus` rejection onto `HwError`, naming the first structural
/// fault the frame actually has.
fn classify(req: &Request, slave: u8, frame: &[u8], e: ErrorKind) -> HwError {
    if matches!(e, ErrorKind::FrameCRCError) {
        return HwError::Crc;
    }
    match check_slave(slave, frame).and_then(|()| check_header(req, frame)) {
        Err(structural) => structural,
        Ok(()) => HwError::Frame(format!("{e:?}")),
    }
}

/// Read one response frame of `expected_len` bytes, or the shorter exception
/// frame, before `timeout` elapses. Sleeps briefly between empty reads.
pub fn read_frame<R: Read>(port: &mut R, expected_len: usize, timeout: Duration) -> Result<Vec<u8>> {
    let deadline = Instant::now() + timeout;
    let mut buf = vec![0u8; expected_len.max(EXCEPTION_FRAME_LEN)];
    let mut want = expected_len;
    let mut filled = 0usize;

    while filled < want {
        match port.read(&mut buf[filled..want]) {
            Ok(0) => {}
            Ok(n) => {
                filled += n;
                if filled >= 2 && buf[1] & EXCEPTION_FLAG != 0 {
                    want = EXCEPTION_FRAME_LEN;
                }
                continue;
            }
            Err(e)
                if matches!(
                    e.kind(),
                    std::io::ErrorKind::TimedOut
                        | std::io::ErrorKind::WouldBlock
                        | std::io::ErrorKind::Interrupted
                ) => {}
            Err(e) => return Err(HwError::Io(e)),
        }
        if Instant::now() >= deadline {
            return Err(HwError::Timeout);
        }
        std::thread::sleep(Duration::from_millis(1));
    }
    buf.truncate(filled);
    Ok(buf)
}

/// Modbus RTU master over any byte stream (a serial port in production).
pub struct RtuBus<T> {
    port: T,
    slave: u8,
    timeout: Duration,
    mreq: ModbusRequest,
}

impl<T: Read + Write + Send> RtuBus<T> {
    pub fn new(port: T, slave: u8, timeout: Duration) -> Self {
        Self {
            port,
            slave,
            timeout,
            mreq: ModbusRequest::new(slave, ModbusProto::Rtu),
        }
    }

    pub fn transact(&mut self, req: Request) -> Result<Response> {
        let mut frame = Vec::with_capacity(8);
        req.generate(&mut self.mreq, &mut frame)?;
        trace!(?req, tx = ?frame, "rtu request");
        self.port.write_all(&frame)?;
        self.port.flush()?;
        let rx = read_frame(&mut self.port, req.response_len(), self.timeout)?;
        trace!(rx = ?rx, "rtu response");
        parse_response(&self.mreq, &req, self.slave, &frame, &rx)
    }

    pub fn into_inner(self) -> T {
        self.port
    }
}

fn unexpected(resp: Response) -> Box<dyn std::error::Error + Send + Sync> {
    Box::new(HwError::Frame(format!("unexpected response {resp:?}")))
}

impl<T: Read + Write + Send> RegisterBus for RtuBus<T> {
    fn read_holding_registers(
        &mut self,
        address: u16,
        count: u16,
    ) -> std::result::Result<Vec<u16>, Box<dyn std::error::Error + Send + Sync>> {
        match self.transact(Request::ReadHoldingRegisters { address, count })? {
            Response::Registers(words) => Ok(words),
            other => Err(unexpected(other)),
        }
    }

    fn read_coils(
        &mut self,
        address: u16,
        count: u16,
    ) -> std::result::Result<Vec<bool>, Box<dyn std::error::Error + Send + Sync>> {
        match self.transact(Request::ReadCoils { address, count })? {
            Response::Coils(bits) => Ok(bits),
            other => Err(unexpected(other)),
        }
    }

    fn write_single_register(
        &mut self,
        address: u16,
        value: u16,
    ) -> std::result::Result<(), Box<dyn std::error::Error + Send + Sync>> {
        match self.transact(Request::WriteSingleRegister { address, value })? {
            Response::WriteAck => Ok(()),
            other => Err(unexpected(other)),
        }
    }

    fn write_single_coil(
        &mut self,
        address: u16,
        on: bool,
    ) -> std::result::Result<(), Box<dyn std::error::Error + Send + Sync>> {
        match self.transact(Request::WriteSingleCoil { address, on })? {
            Response::WriteAck => Ok(()),
            other => Err(unexpected(other)),
        }
    }
}
