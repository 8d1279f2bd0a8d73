use em5900::fields::DestMask;
use em5900::vu0::{Vector, VectorUnit};

const ONE: u32 = 0x3f80_0000;

fn f(bits: f32) -> u32 {
    bits.to_bits()
}

#[test]
fn vf0_reads_back_as_unit_w() {
    let mut vu = VectorUnit::new();
    assert_eq!(vu.vf(0), Vector { x: 0, y: 0, z: 0, w: ONE });
    vu.set_vf(0, Vector { x: 1, y: 2, z: 3, w: 4 });
    assert_eq!(vu.vf(0), Vector { x: 0, y: 0, z: 0, w: ONE });
    vu.set_vf_masked(0, DestMask(0xf), Vector { x: 9, y: 9, z: 9, w: 9 });
    assert_eq!(vu.vf(0), Vector { x: 0, y: 0, z: 0, w: ONE });
}

#[test]
fn vi0_is_pinned_to_zero() {
    let mut vu = VectorUnit::new();
    vu.set_vi(0, 0x1234);
    assert_eq!(vu.vi(0), 0);
    vu.write_control(0, 0x1234);
    assert_eq!(vu.read_control(0), 0);
}

#[test]
fn dest_mask_writes_only_selected_lanes() {
    let mut vu = VectorUnit::new();
    vu.set_vf(5, Vector { x: 1, y: 2, z: 3, w: 4 });
    vu.set_vf_masked(5, DestMask(0b1010), Vector { x: 9, y: 9, z: 9, w: 9 });
    assert_eq!(vu.vf(5), Vector { x: 9, y: 2, z: 9, w: 4 });
}

#[test]
fn vector_quadword_layout() {
    let v = Vector { x: 0x11, y: 0x22, z: 0x33, w: 0x44 };
    let q = v.to_u128();
    assert_eq!(q, 0x44u128 << 96 | 0x33 << 64 | 0x22 << 32 | 0x11);
    assert_eq!(Vector::from_u128(q), v);
}

#[test]
fn iadd_wraps() {
    let mut vu = VectorUnit::new();
    vu.set_vi(1, 0xffff);
    vu.set_vi(2, 2);
    vu.iadd(3, 1, 2);
    assert_eq!(vu.vi(3), 1);
}

#[test]
fn sqi_stores_and_post_increments() {
    let mut vu = VectorUnit::new();
    vu.set_vi(1, 0x10);
    vu.set_vf(5, Vector { x: 0x11, y: 0x22, z: 0x33, w: 0x44 });
    vu.sqi(DestMask(0xf), 5, 1);
    assert_eq!(&vu.data[0x100..0x104], &[0x11, 0, 0, 0]);
    assert_eq!(&vu.data[0x104..0x108], &[0x22, 0, 0, 0]);
    assert_eq!(&vu.data[0x108..0x10c], &[0x33, 0, 0, 0]);
    assert_eq!(&vu.data[0x10c..0x110], &[0x44, 0, 0, 0]);
    assert_eq!(vu.vi(1), 0x11);
}

#[test]
fn sqi_respects_the_dest_mask() {
    let mut vu = VectorUnit::new();
    vu.data[0x20..0x30].copy_from_slice(&[0xee; 16]);
    vu.set_vi(1, 0x2);
    vu.set_vf(7, Vector { x: 1, y: 2, z: 3, w: 4 });
    vu.sqi(DestMask(0b1000), 7, 1);
    assert_eq!(&vu.data[0x20..0x24], &[1, 0, 0, 0]);
    assert_eq!(&vu.data[0x24..0x28], &[0xee; 4]);
}

#[test]
fn iswr_broadcasts_the_integer() {
    let mut vu = VectorUnit::new();
    vu.set_vi(2, 0x3); // address 0x30
    vu.set_vi(4, 0xabcd);
    vu.iswr(DestMask(0b1001), 4, 2);
    assert_eq!(&vu.data[0x30..0x34], &[0xcd, 0xab, 0, 0]);
    assert_eq!(&vu.data[0x34..0x38], &[0; 4]);
    assert_eq!(&vu.data[0x3c..0x40], &[0xcd, 0xab, 0, 0]);
}

#[test]
fn sub_is_lane_wise_f32() {
    let mut vu = VectorUnit::new();
    vu.set_vf(1, Vector { x: f(5.0), y: f(4.0), z: f(3.0), w: f(2.0) });
    vu.set_vf(2, Vector { x: f(1.0), y: f(1.5), z: f(0.5), w: f(2.0) });
    vu.sub(DestMask(0xf), 3, 1, 2);
    assert_eq!(vu.vf(3), Vector { x: f(4.0), y: f(2.5), z: f(2.5), w: f(0.0) });
}

#[test]
fn sub_against_vf0_w_lane() {
    let mut vu = VectorUnit::new();
    vu.set_vf(1, Vector { x: f(1.0), y: f(1.0), z: f(1.0), w: f(3.0) });
    // vf0.w reads as 1.0
    vu.sub(DestMask(0b0001), 3, 1, 0);
    assert_eq!(vu.vf(3).w, f(2.0));
}

#[test]
fn control_indices_mirror_the_integer_file() {
    let mut vu = VectorUnit::new();
    vu.write_control(5, 0x0001_1234);
    assert_eq!(vu.vi(5), 0x1234);
    assert_eq!(vu.read_control(5), 0x1234);
}

#[test]
fn fbrst_reset_clears_the_register_file() {
    let mut vu = VectorUnit::new();
    vu.set_vi(3, 7);
    vu.set_vf(4, Vector { x: 1, y: 1, z: 1, w: 1 });
    vu.write_control(28, 0x2);
    assert_eq!(vu.vi(3), 0);
    assert_eq!(vu.vf(4), Vector::ZERO);
    assert_eq!(vu.vf(0).w, ONE);
    // the reset bit itself does not stick
    assert_eq!(vu.read_control(28), 0);
}

#[test]
fn vpu_stat_reads_idle() {
    let mut vu = VectorUnit::new();
    assert_eq!(vu.read_control(29), 0);
    vu.write_control(29, 0xffff);
    assert_eq!(vu.read_control(29), 0);
}

#[test]
fn cmsar0_holds_the_entry_point() {
    let mut vu = VectorUnit::new();
    vu.write_control(27, 0xdead_0040);
    assert_eq!(vu.read_control(27), 0x40);
    assert_eq!(vu.cmsar0, 0x40);
}

#[test]
fn scratch_registers_hold_values() {
    let mut vu = VectorUnit::new();
    vu.write_control(21, ONE); // I
    vu.write_control(22, f(0.5)); // Q
    assert_eq!(vu.read_control(21), ONE);
    assert_eq!(vu.read_control(22), f(0.5));
    assert_eq!(vu.q, f(0.5));
}
