use em5900::gs::{reg, Gs, Imr, Prim, PrimKind, Rasterizer, Vertex};
use std::cell::RefCell;
use std::rc::Rc;

struct RecordingRasterizer {
    kicks: Rc<RefCell<Vec<(PrimKind, usize)>>>,
}

impl Rasterizer for RecordingRasterizer {
    fn kick(&mut self, prim: &Prim, vertices: &[Vertex]) {
        self.kicks.borrow_mut().push((prim.kind, vertices.len()));
    }
}

fn recording_gs() -> (Gs, Rc<RefCell<Vec<(PrimKind, usize)>>>) {
    let kicks = Rc::new(RefCell::new(Vec::new()));
    let mut gs = Gs::new();
    gs.set_rasterizer(Box::new(RecordingRasterizer { kicks: Rc::clone(&kicks) }));
    (gs, kicks)
}

fn xyz(x: u16, y: u16, z: u32) -> u64 {
    x as u64 | (y as u64) << 16 | (z as u64) << 32
}

#[test]
fn triangle_kicks_on_the_third_vertex() {
    let (mut gs, kicks) = recording_gs();
    gs.write_internal(reg::PRIM, 3).unwrap();
    gs.write_internal(reg::XYZ2, xyz(0, 0, 1)).unwrap();
    gs.write_internal(reg::XYZ2, xyz(16, 0, 1)).unwrap();
    assert!(kicks.borrow().is_empty());
    gs.write_internal(reg::XYZ2, xyz(16, 16, 1)).unwrap();
    assert_eq!(*kicks.borrow(), vec![(PrimKind::Triangle, 3)]);
    assert_eq!(gs.vertex_queue_len(), 0);
}

#[test]
fn point_kicks_immediately() {
    let (mut gs, kicks) = recording_gs();
    gs.write_internal(reg::PRIM, 0).unwrap();
    gs.write_internal(reg::XYZ3, xyz(1, 2, 3)).unwrap();
    assert_eq!(*kicks.borrow(), vec![(PrimKind::Point, 1)]);
}

#[test]
fn sprite_takes_two_vertices() {
    let (mut gs, kicks) = recording_gs();
    gs.write_internal(reg::PRIM, 6).unwrap();
    gs.write_internal(reg::XYZ2, xyz(0, 0, 0)).unwrap();
    gs.write_internal(reg::XYZ2, xyz(32, 32, 0)).unwrap();
    assert_eq!(*kicks.borrow(), vec![(PrimKind::Sprite, 2)]);
}

#[test]
fn triangle_strip_keeps_the_rolling_pair() {
    let (mut gs, kicks) = recording_gs();
    gs.write_internal(reg::PRIM, 4).unwrap();
    for j in 0..4u16 {
        gs.write_internal(reg::XYZ2, xyz(j * 16, j * 16, 0)).unwrap();
    }
    assert_eq!(kicks.borrow().len(), 2);
    assert_eq!(gs.vertex_queue_len(), 2);
}

#[test]
fn writing_prim_clears_the_vertex_queue() {
    let (mut gs, _) = recording_gs();
    gs.write_internal(reg::PRIM, 3).unwrap();
    gs.write_internal(reg::XYZ2, xyz(0, 0, 0)).unwrap();
    assert_eq!(gs.vertex_queue_len(), 1);
    gs.write_internal(reg::PRIM, 3).unwrap();
    assert_eq!(gs.vertex_queue_len(), 0);
}

#[test]
fn vertices_latch_the_color_state() {
    let (mut gs, _) = recording_gs();
    gs.write_internal(reg::PRIM, 0).unwrap();
    gs.write_internal(reg::RGBAQ, 0x44_33_22_11).unwrap();
    gs.write_internal(reg::XYZ2, xyz(0, 0, 0)).unwrap();
    assert_eq!(gs.rgbaq.r, 0x11);
    assert_eq!(gs.rgbaq.g, 0x22);
    assert_eq!(gs.rgbaq.b, 0x33);
    assert_eq!(gs.rgbaq.a, 0x44);
}

#[test]
fn register_0x0f_is_a_nop() {
    let mut gs = Gs::new();
    gs.write_internal(reg::NOP, 0xffff_ffff_ffff_ffff).unwrap();
}

#[test]
fn packed_ad_equals_direct_write() {
    let mut packed = Gs::new();
    let mut direct = Gs::new();
    let value = 0x0000_0030_0002_01ffu64;
    packed.write_packed(0xe, (reg::FRAME_1 as u128) << 64 | value as u128).unwrap();
    direct.write_internal(reg::FRAME_1, value).unwrap();
    assert_eq!(packed.frame[0].fbp, direct.frame[0].fbp);
    assert_eq!(packed.frame[0].fbw, direct.frame[0].fbw);
    assert_eq!(packed.frame[0].psm, direct.frame[0].psm);
    assert_eq!(packed.frame[0].fbmsk, direct.frame[0].fbmsk);
}

#[test]
fn packed_st_latches_q_for_rgbaq() {
    let mut gs = Gs::new();
    let q = 0x4080_0000u32; // 4.0
    gs.write_packed(0x2, 0x3f80_0000u128 | (0x4000_0000u128) << 32 | (q as u128) << 64)
        .unwrap();
    gs.write_packed(0x1, 0x10u128 | 0x20u128 << 32 | 0x30u128 << 64 | 0x40u128 << 96).unwrap();
    assert_eq!(gs.rgbaq.r, 0x10);
    assert_eq!(gs.rgbaq.g, 0x20);
    assert_eq!(gs.rgbaq.b, 0x30);
    assert_eq!(gs.rgbaq.a, 0x40);
    assert_eq!(gs.rgbaq.q, q);
}

#[test]
fn packed_xyz2_with_adc_does_not_need_prim_kick() {
    let (mut gs, kicks) = recording_gs();
    gs.write_internal(reg::PRIM, 0).unwrap();
    // ADC set routes to XYZ3, which still enqueues and kicks points
    gs.write_packed(0x5, 1u128 << 111 | 8).unwrap();
    assert_eq!(kicks.borrow().len(), 1);
}

#[test]
fn reserved_alpha_selector_is_fatal() {
    let mut gs = Gs::new();
    assert!(gs.write_internal(reg::ALPHA_1, 3).is_err());
    assert!(gs.write_internal(reg::ALPHA_2, 2 | 2 << 2).is_ok());
}

#[test]
fn csr_reset_is_idempotent() {
    let mut gs = Gs::new();
    gs.set_finish();
    gs.write_priv(0x1010, 0).unwrap(); // unmask everything
    gs.write_priv(0x1000, 1 << 9).unwrap();
    let once_csr = gs.read_priv(0x1000).unwrap();
    let once_imr = gs.read_priv(0x1010).unwrap();
    gs.write_priv(0x1000, 1 << 9).unwrap();
    assert_eq!(gs.read_priv(0x1000).unwrap(), once_csr);
    assert_eq!(gs.read_priv(0x1010).unwrap(), once_imr);
    assert_eq!(gs.imr, Imr::all());
}

#[test]
fn csr_carries_revision_and_id() {
    let gs = Gs::new();
    let csr = gs.read_priv(0x1000).unwrap();
    assert_eq!(csr >> 16 & 0xff, 0x1b);
    assert_eq!(csr >> 24 & 0xff, 0x55);
    // output FIFO reads as empty
    assert_eq!(csr >> 14 & 3, 1);
}

#[test]
fn csr_sticky_bits_are_write_to_clear() {
    let mut gs = Gs::new();
    gs.set_finish();
    assert_eq!(gs.read_priv(0x1000).unwrap() & 2, 2);
    gs.write_priv(0x1000, 2).unwrap();
    assert_eq!(gs.read_priv(0x1000).unwrap() & 2, 0);
}

#[test]
fn finish_raises_only_when_unmasked() {
    let mut gs = Gs::new();
    gs.set_finish();
    assert!(!gs.take_irq()); // masked by default
    gs.write_priv(0x1010, 0).unwrap();
    gs.set_finish();
    assert!(gs.take_irq());
    assert!(!gs.take_irq()); // the edge drains
}

#[test]
fn dispfb_write_caches_the_frame_pointer() {
    let mut gs = Gs::new();
    gs.write_priv(0x0070, 3).unwrap();
    assert_eq!(gs.display_fb, 3 * 2048);
    gs.write_priv(0x0090, 5).unwrap();
    assert_eq!(gs.display_fb, 5 * 2048);
}

#[test]
fn host_to_local_transmission_fills_vram() {
    let mut gs = Gs::new();
    gs.write_internal(reg::BITBLTBUF, 1u64 << 48).unwrap(); // dbw = 64 pixels
    gs.write_internal(reg::TRXPOS, 0).unwrap();
    gs.write_internal(reg::TRXREG, 2 | 1 << 32).unwrap(); // 2x1
    gs.write_internal(reg::TRXDIR, 0).unwrap();
    assert!(gs.transmission_active());
    gs.write_internal(reg::HWREG, 0xaabb_ccdd_1122_3344).unwrap();
    assert!(!gs.transmission_active());
    assert_eq!(&gs.vram[0..4], &0x1122_3344u32.to_le_bytes());
    assert_eq!(&gs.vram[4..8], &0xaabb_ccddu32.to_le_bytes());
}

#[test]
fn local_to_local_transmission_copies_immediately() {
    let mut gs = Gs::new();
    gs.vram[0..4].copy_from_slice(&0xdead_beefu32.to_le_bytes());
    // source at word 0, destination at word 256 (dbp = 4 * 64 words)
    gs.write_internal(reg::BITBLTBUF, 1 << 16 | 4u64 << 32 | 1 << 48).unwrap();
    gs.write_internal(reg::TRXPOS, 0).unwrap();
    gs.write_internal(reg::TRXREG, 1 | 1 << 32).unwrap();
    gs.write_internal(reg::TRXDIR, 2).unwrap();
    assert!(!gs.transmission_active());
    assert_eq!(&gs.vram[1024..1028], &0xdead_beefu32.to_le_bytes());
}

#[test]
fn transmission_offsets_respect_trxpos() {
    let mut gs = Gs::new();
    gs.write_internal(reg::BITBLTBUF, 1u64 << 48).unwrap();
    // destination starts at (2, 1) in a 64-pixel-wide buffer
    gs.write_internal(reg::TRXPOS, 2u64 << 32 | 1u64 << 48).unwrap();
    gs.write_internal(reg::TRXREG, 2 | 1 << 32).unwrap();
    gs.write_internal(reg::TRXDIR, 0).unwrap();
    gs.write_internal(reg::HWREG, 0x0000_0002_0000_0001).unwrap();
    let word = (64 + 2) * 4;
    assert_eq!(&gs.vram[word..word + 4], &1u32.to_le_bytes());
    assert_eq!(&gs.vram[word + 4..word + 8], &2u32.to_le_bytes());
}
