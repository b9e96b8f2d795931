//! Counter reference applet
//!
//! A 32-bit unsigned counter with an optional upper limit. Arithmetic that
//! would overflow the 32-bit range, cross an enabled limit, or drop below
//! zero is rejected without touching the stored value.

use log::debug;

use crate::apdu::{Apdu, Response, SW};

/// AID of the counter applet
pub const AID: &[u8] = &[0xF0, 0x00, 0x00, 0x00, 0x01, 0x00, 0x02];

/// Limit installed at engine start (disabled until SET-LIMIT enables one)
const DEFAULT_LIMIT: u32 = 0x7FFF_FFFF;

/// Instructions understood by the counter applet
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Instruction {
    Get,
    Increment,
    Decrement,
    Reset,
    SetValue,
    SetLimit,
    GetInfo,
    Add,
    Subtract,
    Multiply,
}

impl Instruction {
    fn from_ins(ins: u8) -> Option<Self> {
        match ins {
            0x10 => Some(Self::Get),
            0x11 => Some(Self::Increment),
            0x12 => Some(Self::Decrement),
            0x13 => Some(Self::Reset),
            0x14 => Some(Self::SetValue),
            0x15 => Some(Self::SetLimit),
            0x16 => Some(Self::GetInfo),
            0x17 => Some(Self::Add),
            0x18 => Some(Self::Subtract),
            0x19 => Some(Self::Multiply),
            _ => None,
        }
    }
}

/// Mutable state of the counter applet
///
/// Defaults: value 0, limit 0x7FFFFFFF disabled, operation counter 0.
pub struct CounterApplet {
    value: u32,
    limit: u32,
    limit_enabled: bool,
    op_count: u16,
}

impl Default for CounterApplet {
    fn default() -> Self {
        Self::new()
    }
}

impl CounterApplet {
    pub fn new() -> Self {
        Self {
            value: 0,
            limit: DEFAULT_LIMIT,
            limit_enabled: false,
            op_count: 0,
        }
    }

    /// Handle one proprietary-class command
    ///
    /// The operation counter covers every recognized, well-formed instruction
    /// (including arithmetic rejected by the limit); malformed operands and
    /// unknown instructions do not count.
    pub fn handle(&mut self, apdu: &Apdu) -> Response {
        let instruction = match Instruction::from_ins(apdu.ins) {
            Some(i) => i,
            None => {
                debug!("counter applet: unknown INS 0x{:02X}", apdu.ins);
                return Response::error(SW::INS_NOT_SUPPORTED);
            }
        };

        // Operand shape checks come before the instruction counts
        let operand = match self.parse_operand(instruction, apdu) {
            Ok(op) => op,
            Err(sw) => return Response::error(sw),
        };
        self.op_count = self.op_count.wrapping_add(1);

        match (instruction, operand) {
            (Instruction::Get, _) => Response::success(self.value.to_be_bytes().to_vec()),
            (Instruction::Increment, Some(by)) => self.add(by),
            (Instruction::Add, Some(by)) => self.add(by),
            (Instruction::Decrement, Some(by)) => self.subtract(by),
            (Instruction::Subtract, Some(by)) => self.subtract(by),
            (Instruction::Multiply, Some(by)) => self.multiply(by),
            (Instruction::Reset, _) => {
                self.value = 0;
                Response::ok()
            }
            (Instruction::SetValue, Some(value)) => self.set_value(value),
            (Instruction::SetLimit, Some(limit)) => {
                self.limit = limit;
                self.limit_enabled = apdu.p1 == 0x01;
                Response::ok()
            }
            (Instruction::GetInfo, _) => self.get_info(),
            // parse_operand always yields Some for operand-carrying instructions
            _ => Response::error(SW::UNKNOWN_ERROR),
        }
    }

    /// Extract the instruction's numeric operand, enforcing its wire shape
    fn parse_operand(&self, instruction: Instruction, apdu: &Apdu) -> Result<Option<u32>, u16> {
        match instruction {
            Instruction::Get | Instruction::Reset | Instruction::GetInfo => Ok(None),
            // P1 operand, zero meaning the instruction's default
            Instruction::Increment | Instruction::Decrement => {
                Ok(Some(if apdu.p1 == 0 { 1 } else { apdu.p1 as u32 }))
            }
            Instruction::Multiply => Ok(Some(if apdu.p1 == 0 { 2 } else { apdu.p1 as u32 })),
            // 2-byte big-endian data operand
            Instruction::Add | Instruction::Subtract => {
                if apdu.data.len() != 2 {
                    return Err(SW::WRONG_LENGTH);
                }
                Ok(Some(u16::from_be_bytes([apdu.data[0], apdu.data[1]]) as u32))
            }
            // 4-byte big-endian data operand
            Instruction::SetValue | Instruction::SetLimit => {
                if apdu.data.len() != 4 {
                    return Err(SW::WRONG_LENGTH);
                }
                Ok(Some(u32::from_be_bytes([
                    apdu.data[0],
                    apdu.data[1],
                    apdu.data[2],
                    apdu.data[3],
                ])))
            }
        }
    }

    fn exceeds_limit(&self, candidate: u32) -> bool {
        self.limit_enabled && candidate > self.limit
    }

    fn add(&mut self, by: u32) -> Response {
        match self.value.checked_add(by) {
            Some(new) if !self.exceeds_limit(new) => {
                self.value = new;
                Response::success(self.value.to_be_bytes().to_vec())
            }
            _ => Response::error(SW::CONDITIONS_NOT_SATISFIED),
        }
    }

    fn subtract(&mut self, by: u32) -> Response {
        match self.value.checked_sub(by) {
            Some(new) => {
                self.value = new;
                Response::success(self.value.to_be_bytes().to_vec())
            }
            None => Response::error(SW::CONDITIONS_NOT_SATISFIED),
        }
    }

    fn multiply(&mut self, by: u32) -> Response {
        match self.value.checked_mul(by) {
            Some(new) if !self.exceeds_limit(new) => {
                self.value = new;
                Response::success(self.value.to_be_bytes().to_vec())
            }
            _ => Response::error(SW::CONDITIONS_NOT_SATISFIED),
        }
    }

    fn set_value(&mut self, value: u32) -> Response {
        if self.exceeds_limit(value) {
            return Response::error(SW::CONDITIONS_NOT_SATISFIED);
        }
        self.value = value;
        Response::ok()
    }

    /// Fixed-layout info block:
    /// value(4 BE) | limit(4 BE) | limit enabled(1) | operation count(2 BE)
    fn get_info(&self) -> Response {
        let mut info = Vec::with_capacity(11);
        info.extend_from_slice(&self.value.to_be_bytes());
        info.extend_from_slice(&self.limit.to_be_bytes());
        info.push(u8::from(self.limit_enabled));
        info.extend_from_slice(&self.op_count.to_be_bytes());
        Response::success(info)
    }
}
