//! Embedded card emulation engine
//!
//! A minimal emulated smart card that can stand in for the remote backend:
//! it handles SELECT and GET RESPONSE itself and routes proprietary-class
//! commands to whichever reference applet is selected. One engine models one
//! card with one currently-selected applet; each applet owns its own state
//! slot, and selecting another applet never touches it.

pub mod atr;
pub mod counter;
pub mod hello;

use log::debug;

use crate::apdu::{ins, parse_apdu, Response, CLA_PROPRIETARY, SW};
use counter::CounterApplet;
use hello::HelloApplet;

/// The emulated card: selected applet plus per-applet state
pub struct CardEngine {
    selected_aid: Option<Vec<u8>>,
    hello: HelloApplet,
    counter: CounterApplet,
}

impl Default for CardEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl CardEngine {
    /// Create an engine with both applets at their installed defaults
    pub fn new() -> Self {
        Self {
            selected_aid: None,
            hello: HelloApplet::new(),
            counter: CounterApplet::new(),
        }
    }

    /// AID of the currently selected applet, if any
    pub fn selected_aid(&self) -> Option<&[u8]> {
        self.selected_aid.as_deref()
    }

    /// Drop the current applet selection; per-applet state is untouched
    pub fn deselect(&mut self) {
        self.selected_aid = None;
    }

    /// Map one command APDU to a response
    ///
    /// Never fails: every malformed or unsupported command becomes a status
    /// word. The returned response always carries at least the 2 SW bytes.
    pub fn dispatch(&mut self, command: &[u8]) -> Response {
        if command.len() < 4 {
            return Response::error(SW::WRONG_LENGTH);
        }

        let cla = command[0];
        let ins_byte = command[1];

        if ins_byte == ins::SELECT {
            return self.handle_select(command);
        }

        if ins_byte == ins::GET_RESPONSE {
            // Remaining-data retrieval is not modeled; everything fits in one
            // response already.
            return Response::ok();
        }

        if cla == CLA_PROPRIETARY {
            let apdu = match parse_apdu(command) {
                Ok(apdu) => apdu,
                Err(e) => {
                    debug!("malformed command: {e}");
                    return Response::error(SW::WRONG_LENGTH);
                }
            };
            match self.selected_aid.as_deref() {
                Some(aid) if aid == hello::AID => return self.hello.handle(&apdu),
                Some(aid) if aid == counter::AID => return self.counter.handle(&apdu),
                _ => {}
            }
        }

        Response::error(SW::INS_NOT_SUPPORTED)
    }

    /// SELECT by AID: record the selection and answer with a minimal FCI
    fn handle_select(&mut self, command: &[u8]) -> Response {
        if command.len() < 5 {
            return Response::error(SW::WRONG_LENGTH);
        }
        let lc = command[4] as usize;
        if lc == 0 || command.len() < 5 + lc {
            return Response::error(SW::WRONG_LENGTH);
        }
        let aid = &command[5..5 + lc];

        debug!("SELECT {:02X?}", aid);
        self.selected_aid = Some(aid.to_vec());

        // FCI template: 6F <len> 84 <len> <AID>
        let mut fci = Vec::with_capacity(4 + aid.len());
        fci.push(0x6F);
        fci.push((aid.len() + 2) as u8);
        fci.push(0x84);
        fci.push(aid.len() as u8);
        fci.extend_from_slice(aid);
        Response::success(fci)
    }
}
