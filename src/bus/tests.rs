use crate::bus::{Bus, CpuMemory, OamDma};
use crate::cartridge::Cartridge;
use crate::controller::Button;
use crate::cpu::CpuBus;
use crate::test_utils::build_ines;

fn bus_with_cart(flags6: u8) -> Bus {
    let rom = build_ines(1, 0, flags6, 0, 1, None);
    let cart = Cartridge::from_ines_bytes(&rom).expect("parse");
    let mut bus = Bus::new();
    bus.insert_cartridge(cart);
    bus
}

fn set_ppu_addr(bus: &mut Bus, addr: u16) {
    let _ = bus.read(0x2002);
    bus.write(0x2006, (addr >> 8) as u8);
    bus.write(0x2006, addr as u8);
}

#[test]
fn ram_mirroring() {
    let mut bus = Bus::new();
    bus.write(0x0001, 0xAA);
    assert_eq!(bus.read(0x0801), 0xAA);
    assert_eq!(bus.read(0x1801), 0xAA);

    bus.write(0x1801, 0x55);
    assert_eq!(bus.read(0x0001), 0x55);
}

#[test]
fn open_bus_tracks_last_access() {
    let mut bus = Bus::new();
    bus.write(0x0010, 0x5A);
    // No cartridge: everything above $4020 is undriven.
    assert_eq!(bus.read(0x8000), 0x5A);
    assert_eq!(bus.read(0x4018), 0x5A);

    bus.write(0x0011, 0x33);
    let _ = bus.read(0x0011);
    assert_eq!(bus.read(0x6000), 0x33);
    assert_eq!(bus.open_bus(), 0x33);
}

#[test]
fn write_only_ppu_registers_read_open_bus() {
    let mut bus = Bus::new();
    bus.write(0x0000, 0x7E);
    let _ = bus.read(0x0000);
    assert_eq!(bus.read(0x2000), 0x7E);
    assert_eq!(bus.read(0x2005), 0x7E);
    // Mirror of $2006.
    assert_eq!(bus.read(0x3FFE), 0x7E);
}

#[test]
fn status_composes_ledger_flag_and_open_bus() {
    let mut bus = Bus::new();
    bus.write(0x0000, 0x1F);
    let _ = bus.read(0x0000);

    bus.record_vblank_set(100);
    bus.set_tick(120);
    assert_eq!(bus.read(0x2002), 0x80 | 0x1F);
    // Flag consumed by the read.
    assert_eq!(bus.read(0x200A) & 0x80, 0);
}

#[test]
fn status_read_on_set_tick_suppresses_nmi() {
    let mut bus = Bus::new();
    bus.write(0x2000, 0x80);
    bus.set_tick(500);
    bus.record_vblank_set(500);
    assert_eq!(bus.read(0x2002) & 0x80, 0x80);
    assert!(!bus.nmi_line());

    bus.set_tick(600);
    assert!(!bus.nmi_line());
}

#[test]
fn nmi_enable_toggle_refires_during_vblank() {
    let mut bus = Bus::new();
    bus.set_tick(10);
    bus.record_vblank_set(10);
    assert!(!bus.nmi_line());

    bus.set_tick(40);
    bus.write(0x2000, 0x80);
    assert!(bus.nmi_line());
    assert_eq!(bus.ledger().last_toggle(), Some(40));

    bus.acknowledge_nmi();
    assert!(!bus.nmi_line());
    assert_eq!(bus.ledger().last_acknowledge(), Some(40));
}

#[test]
fn rewriting_same_enable_is_not_a_toggle() {
    let mut bus = Bus::new();
    bus.write(0x2000, 0x00);
    assert_eq!(bus.ledger().last_toggle(), None);
}

#[test]
fn oam_dma_trigger_is_queued() {
    let mut bus = Bus::new();
    bus.set_tick(45);
    bus.write(0x4014, 0x02);
    assert_eq!(bus.take_oam_dma_request(), Some((0x02, 15)));
    assert_eq!(bus.take_oam_dma_request(), None);
}

#[test]
fn oam_dma_copies_page_through_bus() {
    let mut bus = Bus::new();
    for i in 0..256u16 {
        bus.write(0x0200 + i, i as u8);
    }
    bus.write(0x2003, 0xFE);

    let mut dma = OamDma::new();
    dma.start(0x02, 0);
    let mut ticks = 0;
    while dma.step(&mut bus) {
        ticks += 1;
    }
    assert_eq!(ticks, 512);
    assert_eq!(bus.ppu.oam()[0xFE], 0x00);
    assert_eq!(bus.ppu.oam()[0xFF], 0x01);
    assert_eq!(bus.ppu.oam()[0x00], 0x02);
}

#[test]
fn controller_reads_fill_upper_bits_from_open_bus() {
    let mut bus = Bus::new();
    bus.controllers[0].press(Button::A);
    bus.controllers[1].press(Button::B);
    bus.write(0x4016, 0x41);
    bus.write(0x4016, 0x40);

    assert_eq!(bus.read(0x4016), 0x41);
    assert_eq!(bus.read(0x4016), 0x40);
    assert_eq!(bus.read(0x4017), 0x40);
    assert_eq!(bus.read(0x4017), 0x41);
}

#[test]
fn apu_status_read_acknowledges_frame_irq() {
    let mut bus = Bus::new();
    for _ in 0..crate::apu::FRAME_IRQ_CYCLE {
        bus.apu.step();
    }
    assert_eq!(bus.peek(0x4015) & 0x40, 0x40);
    assert_eq!(bus.read(0x4015) & 0x40, 0x40);
    assert_eq!(bus.read(0x4015) & 0x40, 0);
}

#[test]
fn cartridge_prg_and_prg_ram() {
    let mut bus = bus_with_cart(0);
    assert_eq!(bus.read(0x8000), 0xAA);
    assert_eq!(bus.cpu_read(0xFFFF), 0xAA);

    bus.write(0x6000, 0x42);
    assert_eq!(bus.read(0x6000), 0x42);
    assert_eq!(bus.peek(0x6000), 0x42);
}

#[test]
fn peek_has_no_side_effects() {
    let mut bus = Bus::new();
    bus.record_vblank_set(5);
    bus.write(0x0000, 0x12);
    assert_eq!(bus.peek(0x2002) & 0x80, 0x80);
    assert_eq!(bus.peek(0x2002) & 0x80, 0x80);
    assert!(bus.ledger().flag_visible());
    assert_eq!(bus.peek_word(0x0000), 0x0012);
}

#[test]
fn nametable_horizontal_mirroring() {
    let mut bus = bus_with_cart(0b0000_0000);
    set_ppu_addr(&mut bus, 0x2000);
    bus.write(0x2007, 0x55);

    set_ppu_addr(&mut bus, 0x2400);
    let _ = bus.read(0x2007);
    assert_eq!(bus.read(0x2007), 0x55);
}

#[test]
fn nametable_vertical_mirroring() {
    let mut bus = bus_with_cart(0b0000_0001);
    set_ppu_addr(&mut bus, 0x2000);
    bus.write(0x2007, 0x66);

    set_ppu_addr(&mut bus, 0x2800);
    let _ = bus.read(0x2007);
    assert_eq!(bus.read(0x2007), 0x66);

    set_ppu_addr(&mut bus, 0x2400);
    let _ = bus.read(0x2007);
    assert_eq!(bus.read(0x2007), 0x00);
}

#[test]
fn chr_ram_through_ppudata() {
    let mut bus = bus_with_cart(0);
    set_ppu_addr(&mut bus, 0x0123);
    bus.write(0x2007, 0x9C);
    assert_eq!(bus.cartridge().map(|c| c.ppu_read(0x0123)), Some(0x9C));
}

#[test]
fn power_on_clears_ram_and_ledger_but_reset_keeps_them() {
    let mut bus = bus_with_cart(0);
    bus.write(0x0042, 0x99);
    bus.record_vblank_set(7);

    bus.reset();
    assert_eq!(bus.read(0x0042), 0x99);
    assert!(bus.ledger().span_active());

    bus.power_on(true);
    assert_eq!(bus.read(0x0042), 0x00);
    assert!(!bus.ledger().span_active());
    assert!(bus.cartridge().is_some());
}
