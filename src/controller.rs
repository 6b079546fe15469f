/*!
Standard NES pad behind $4016 / $4017.

The pad is an 8-bit parallel-in serial-out shift register:
- While strobe (bit 0 of a $4016 write) is high the register keeps reloading
  from the live buttons, so every read reports A.
- Once strobe drops, each read returns bit 0 and shifts right, filling with
  ones. Order: A, B, Select, Start, Up, Down, Left, Right; then 1 forever.

Only bit 0 is produced here. The bus fills the upper bits from open bus.
*/

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Button {
    A,
    B,
    Select,
    Start,
    Up,
    Down,
    Left,
    Right,
}

impl Button {
    #[inline]
    const fn mask(self) -> u8 {
        1 << self as u8
    }
}

#[derive(Clone, Debug, Default)]
pub struct Controller {
    buttons: u8,
    shift: u8,
    strobe: bool,
}

impl Controller {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_button(&mut self, button: Button, pressed: bool) {
        if pressed {
            self.buttons |= button.mask();
        } else {
            self.buttons &= !button.mask();
        }
        if self.strobe {
            self.shift = self.buttons;
        }
    }

    pub fn press(&mut self, button: Button) {
        self.set_button(button, true);
    }

    pub fn release(&mut self, button: Button) {
        self.set_button(button, false);
    }

    /// Replace all buttons at once. Bit layout follows `Button` order.
    pub fn set_buttons(&mut self, mask: u8) {
        self.buttons = mask;
        if self.strobe {
            self.shift = mask;
        }
    }

    pub fn buttons(&self) -> u8 {
        self.buttons
    }

    /// $4016 write.
    pub fn write_strobe(&mut self, value: u8) {
        self.strobe = value & 1 != 0;
        if self.strobe {
            self.shift = self.buttons;
        }
    }

    /// Serial read; bit 0 only.
    pub fn read(&mut self) -> u8 {
        if self.strobe {
            return self.buttons & 1;
        }
        let bit = self.shift & 1;
        self.shift = (self.shift >> 1) | 0x80;
        bit
    }

    /// Next bit without shifting.
    pub fn peek(&self) -> u8 {
        if self.strobe {
            self.buttons & 1
        } else {
            self.shift & 1
        }
    }

    pub fn strobe(&self) -> bool {
        self.strobe
    }
}
