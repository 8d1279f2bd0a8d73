use em5900::memory::{Bus, BIOS_SIZE};
use em5900::processor::{Status, CPU};
use std::cell::RefCell;
use std::rc::Rc;

const BASE: u32 = 0x8000_1000;

fn machine() -> CPU {
    let bus = Rc::new(RefCell::new(Bus::new(vec![0; BIOS_SIZE])));
    let mut cpu = CPU::new(bus);
    cpu.pc = BASE;
    cpu.npc = BASE.wrapping_add(4);
    cpu
}

fn load_program(cpu: &mut CPU, words: &[u32]) {
    let mut bus = cpu.bus.borrow_mut();
    for (j, &word) in words.iter().enumerate() {
        bus.write32(0x1000 + 4 * j as u32, word).unwrap();
    }
}

fn step(cpu: &mut CPU, count: usize) {
    for _ in 0..count {
        cpu.step().unwrap();
    }
}

fn op_i(op: u32, rs: usize, rt: usize, imm: u16) -> u32 {
    op << 26 | (rs as u32) << 21 | (rt as u32) << 16 | imm as u32
}

fn op_r(funct: u32, rs: usize, rt: usize, rd: usize, sa: usize) -> u32 {
    (rs as u32) << 21 | (rt as u32) << 16 | (rd as u32) << 11 | (sa as u32) << 6 | funct
}

#[test]
fn gpr_zero_is_pinned() {
    let mut cpu = machine();
    cpu.gpr.set64(0, 0xdead_beef);
    assert_eq!(cpu.gpr.get64(0), 0);
    load_program(&mut cpu, &[op_i(0x09, 0, 0, 0x1234)]); // addiu $zero, $zero, 0x1234
    step(&mut cpu, 1);
    assert_eq!(cpu.gpr.get128(0), 0);
}

#[test]
fn set32_sign_extends() {
    let mut cpu = machine();
    cpu.gpr.set32(8, 0x8000_0000);
    assert_eq!(cpu.gpr.get64(8), 0xffff_ffff_8000_0000);
}

#[test]
fn addiu_wraps_and_sign_extends() {
    let mut cpu = machine();
    cpu.gpr.set64(8, 1);
    load_program(&mut cpu, &[op_i(0x09, 8, 9, 0xffff)]); // addiu $t1, $t0, -1
    step(&mut cpu, 1);
    assert_eq!(cpu.gpr.get64(9), 0);
}

#[test]
fn beql_not_taken_skips_the_slot() {
    let mut cpu = machine();
    cpu.gpr.set64(1, 1);
    load_program(
        &mut cpu,
        &[
            op_i(0x14, 0, 1, 1),       // beql $zero, $at, +4
            op_i(0x09, 0, 8, 1),       // addiu $t0, $zero, 1 (annulled)
            op_i(0x09, 0, 9, 2),       // addiu $t1, $zero, 2
        ],
    );
    step(&mut cpu, 1);
    assert_eq!(cpu.pc, BASE + 8);
    assert_eq!(cpu.in_slot, [false, false]);
    step(&mut cpu, 1);
    assert_eq!(cpu.gpr.get64(8), 0);
    assert_eq!(cpu.gpr.get64(9), 2);
}

#[test]
fn beql_taken_executes_the_slot() {
    let mut cpu = machine();
    load_program(
        &mut cpu,
        &[
            op_i(0x14, 0, 0, 2),       // beql $zero, $zero, +8
            op_i(0x09, 0, 8, 1),       // addiu $t0, $zero, 1 (slot)
            op_i(0x09, 0, 9, 7),       // skipped
            op_i(0x09, 0, 10, 3),      // addiu $t2, $zero, 3 (target)
        ],
    );
    step(&mut cpu, 3);
    assert_eq!(cpu.gpr.get64(8), 1);
    assert_eq!(cpu.gpr.get64(9), 0);
    assert_eq!(cpu.gpr.get64(10), 3);
}

#[test]
fn branch_delay_slot_runs_exactly_once() {
    let mut cpu = machine();
    load_program(
        &mut cpu,
        &[
            op_i(0x04, 0, 0, 2),       // beq $zero, $zero, +8
            op_i(0x09, 8, 8, 1),       // addiu $t0, $t0, 1 (slot)
            op_i(0x09, 9, 9, 1),       // skipped
            op_i(0x09, 10, 10, 1),     // target
        ],
    );
    step(&mut cpu, 1);
    assert!(cpu.in_slot[1]);
    step(&mut cpu, 2);
    assert_eq!(cpu.gpr.get64(8), 1);
    assert_eq!(cpu.gpr.get64(9), 0);
    assert_eq!(cpu.gpr.get64(10), 1);
    assert_eq!(cpu.pc, BASE + 16);
}

#[test]
fn jal_links_past_the_slot() {
    let mut cpu = machine();
    // jal 0x8000_2000; target index covers the low 28 bits
    let target = (0x8000_2000u32 & 0x0fff_ffff) >> 2;
    load_program(&mut cpu, &[0x03 << 26 | target, 0]);
    step(&mut cpu, 1);
    assert_eq!(cpu.gpr.get64(31), (BASE + 8) as u64);
    step(&mut cpu, 1); // the slot
    assert_eq!(cpu.pc, 0x8000_2000);
}

#[test]
fn jr_jumps_to_register() {
    let mut cpu = machine();
    cpu.gpr.set64(8, 0x8000_3000);
    load_program(&mut cpu, &[op_r(0x08, 8, 0, 0, 0), 0]);
    step(&mut cpu, 2);
    assert_eq!(cpu.pc, 0x8000_3000);
}

#[test]
fn lq_sq_roundtrip() {
    let mut cpu = machine();
    let value = 0x0123_4567_89ab_cdef_fedc_ba98_7654_3210u128;
    cpu.gpr.set128(8, value);
    cpu.gpr.set64(9, 0x8000_4000);
    load_program(
        &mut cpu,
        &[
            0x1f << 26 | 9 << 21 | 8 << 16, // sq $t0, 0($t1)
            0x1e << 26 | 9 << 21 | 10 << 16, // lq $t2, 0($t1)
        ],
    );
    step(&mut cpu, 2);
    assert_eq!(cpu.gpr.get128(10), value);
}

#[test]
fn unaligned_dword_loads_assemble_the_value() {
    let mut cpu = machine();
    {
        let mut bus = cpu.bus.borrow_mut();
        for j in 0..16u32 {
            bus.write8(0x5000 + j, j as u8).unwrap();
        }
    }
    cpu.gpr.set64(9, 0x8000_5003);
    load_program(
        &mut cpu,
        &[
            0x1b << 26 | 9 << 21 | 8 << 16,     // ldr $t0, 0($t1)
            0x1a << 26 | 9 << 21 | 8 << 16 | 7, // ldl $t0, 7($t1)
        ],
    );
    step(&mut cpu, 2);
    // bytes 3..=10, little endian
    assert_eq!(cpu.gpr.get64(8), 0x0a09_0807_0605_0403);
}

#[test]
fn sdl_sdr_roundtrip_when_aligned() {
    let mut cpu = machine();
    let value = 0x1122_3344_5566_7788u64;
    {
        let mut bus = cpu.bus.borrow_mut();
        bus.write64(0x6000, value).unwrap();
    }
    cpu.gpr.set64(9, 0x8000_6000);
    cpu.gpr.set64(10, 0x8000_6010);
    load_program(
        &mut cpu,
        &[
            0x37 << 26 | 9 << 21 | 8 << 16,      // ld $t0, 0($t1)
            0x2c << 26 | 10 << 21 | 8 << 16 | 7, // sdl $t0, 7($t2)
            0x2d << 26 | 10 << 21 | 8 << 16,     // sdr $t0, 0($t2)
        ],
    );
    step(&mut cpu, 3);
    assert_eq!(cpu.bus.borrow_mut().read64(0x6010).unwrap(), value);
}

#[test]
fn misaligned_word_access_is_fatal() {
    let mut cpu = machine();
    cpu.gpr.set64(9, 0x8000_7002);
    load_program(&mut cpu, &[0x23 << 26 | 9 << 21 | 8 << 16]); // lw $t0, 0($t1)
    assert!(cpu.step().is_err());
}

#[test]
fn mult_fills_both_halves() {
    let mut cpu = machine();
    cpu.gpr.set32(4, 0xffff_ffff); // -1
    cpu.gpr.set32(5, 3);
    load_program(&mut cpu, &[op_r(0x18, 4, 5, 2, 0)]); // mult $v0, $a0, $a1
    step(&mut cpu, 1);
    assert_eq!(cpu.lo0(), 0xffff_ffff_ffff_fffd);
    assert_eq!(cpu.hi0(), 0xffff_ffff_ffff_ffff);
    assert_eq!(cpu.gpr.get64(2), 0xffff_ffff_ffff_fffd);
}

#[test]
fn mult1_leaves_pipe0_alone() {
    let mut cpu = machine();
    cpu.set_lo0(0x1111);
    cpu.gpr.set32(4, 2);
    cpu.gpr.set32(5, 3);
    load_program(&mut cpu, &[0x1c << 26 | op_r(0x18, 4, 5, 0, 0)]); // mult1 $a0, $a1
    step(&mut cpu, 1);
    assert_eq!(cpu.lo1(), 6);
    assert_eq!(cpu.lo0(), 0x1111);
}

#[test]
fn division_by_zero_is_signalled_not_raised() {
    let mut cpu = machine();
    cpu.gpr.set32(4, 5);
    load_program(&mut cpu, &[op_r(0x1a, 4, 0, 0, 0)]); // div $a0, $zero
    step(&mut cpu, 1);
    assert_eq!(cpu.lo0(), u64::MAX);
    assert_eq!(cpu.hi0(), 5);
    // no exception was entered
    assert_eq!(cpu.pc, BASE + 4);
}

#[test]
fn padduw_saturates() {
    let mut cpu = machine();
    cpu.gpr.set128(4, 0xffff_ffff);
    cpu.gpr.set128(5, 2 | 3 << 32);
    // padduw $v0, $a0, $a1
    load_program(&mut cpu, &[0x1c << 26 | op_r(0x28, 4, 5, 2, 0x10)]);
    step(&mut cpu, 1);
    assert_eq!(cpu.gpr.get128(2), 0xffff_ffff | 3u128 << 32);
}

#[test]
fn plzcw_counts_sign_bits() {
    let mut cpu = machine();
    cpu.gpr.set64(4, 0x0000_0001_8000_0000);
    load_program(&mut cpu, &[0x1c << 26 | op_r(0x04, 4, 0, 2, 0)]); // plzcw $v0, $a0
    step(&mut cpu, 1);
    assert_eq!(cpu.gpr.get64(2), 30 << 32);
}

#[test]
fn por_is_full_width() {
    let mut cpu = machine();
    cpu.gpr.set128(4, 0xf000_0000_0000_0000_0000_0000_0000_000f);
    cpu.gpr.set128(5, 0x0f00_0000_0000_0000_0000_0000_0000_00f0);
    // por $v0, $a0, $a1
    load_program(&mut cpu, &[0x1c << 26 | op_r(0x29, 4, 5, 2, 0x12)]);
    step(&mut cpu, 1);
    assert_eq!(cpu.gpr.get128(2), 0xff00_0000_0000_0000_0000_0000_0000_00ff);
}

#[test]
fn add_overflow_raises_without_writing() {
    let mut cpu = machine();
    cpu.cop0.status.remove(Status::BEV);
    cpu.gpr.set32(4, 0x7fff_ffff);
    cpu.gpr.set32(5, 1);
    cpu.gpr.set64(2, 0x55);
    load_program(&mut cpu, &[op_r(0x20, 4, 5, 2, 0)]); // add $v0, $a0, $a1
    step(&mut cpu, 1);
    assert_eq!(cpu.pc, 0x8000_0180);
    assert_eq!(cpu.cop0.cause >> 2 & 0x1f, 12);
    assert_eq!(cpu.gpr.get64(2), 0x55);
}

#[test]
fn addi_without_overflow_behaves_like_addiu() {
    let mut cpu = machine();
    cpu.gpr.set32(4, 40);
    load_program(&mut cpu, &[op_i(0x08, 4, 2, 2)]); // addi $v0, $a0, 2
    step(&mut cpu, 1);
    assert_eq!(cpu.gpr.get64(2), 42);
}

#[test]
fn bgezal_links_even_when_not_taken() {
    let mut cpu = machine();
    cpu.gpr.set64(4, u64::MAX); // negative: not taken
    load_program(&mut cpu, &[0x01 << 26 | 4 << 21 | 0x11 << 16 | 4, 0, 0]);
    step(&mut cpu, 2);
    assert_eq!(cpu.gpr.get64(31), (BASE + 8) as u64);
    assert_eq!(cpu.pc, BASE + 8);
}

#[test]
fn pand_pnor_are_full_width() {
    let mut cpu = machine();
    cpu.gpr.set128(4, 0xff00_0000_0000_0000_0000_0000_0000_00ff);
    cpu.gpr.set128(5, 0x0f00_0000_0000_0000_0000_0000_0000_00f0);
    load_program(
        &mut cpu,
        &[
            0x1c << 26 | op_r(0x09, 4, 5, 2, 0x12), // pand $v0, $a0, $a1
            0x1c << 26 | op_r(0x29, 4, 5, 3, 0x13), // pnor $v1, $a0, $a1
        ],
    );
    step(&mut cpu, 2);
    assert_eq!(cpu.gpr.get128(2), 0x0f00_0000_0000_0000_0000_0000_0000_00f0);
    assert_eq!(cpu.gpr.get128(3), !0xff00_0000_0000_0000_0000_0000_0000_00ffu128);
}

#[test]
fn syscall_vectors_through_bev() {
    let mut cpu = machine();
    load_program(&mut cpu, &[op_r(0x0c, 0, 0, 0, 0)]); // syscall
    step(&mut cpu, 1);
    assert_eq!(cpu.pc, 0xbfc0_0380);
    assert_eq!(cpu.cop0.cause >> 2 & 0x1f, 8);
    assert!(cpu.cop0.status.contains(Status::EXL));
}

#[test]
fn syscall_records_epc_without_bev() {
    let mut cpu = machine();
    cpu.cop0.status.remove(Status::BEV);
    cpu.cop0.status.remove(Status::ERL);
    load_program(&mut cpu, &[op_r(0x0c, 0, 0, 0, 0)]);
    step(&mut cpu, 1);
    assert_eq!(cpu.pc, 0x8000_0180);
    assert_eq!(cpu.cop0.epc, BASE);
}

#[test]
fn eret_returns_through_error_epc_when_erl() {
    let mut cpu = machine();
    cpu.cop0.error_epc = 0x8000_9000;
    // status still carries ERL from reset
    load_program(&mut cpu, &[0x10 << 26 | 0x10 << 21 | 0x18]); // eret
    step(&mut cpu, 1);
    assert_eq!(cpu.pc, 0x8000_9000);
    assert!(!cpu.cop0.status.contains(Status::ERL));
}

#[test]
fn mfc0_mtc0_exchange() {
    let mut cpu = machine();
    cpu.gpr.set32(8, 0x1234);
    load_program(
        &mut cpu,
        &[
            0x10 << 26 | 0x04 << 21 | 8 << 16 | 11 << 11, // mtc0 $t0, Compare
            0x10 << 26 | 0x00 << 21 | 9 << 16 | 11 << 11, // mfc0 $t1, Compare
        ],
    );
    step(&mut cpu, 2);
    assert_eq!(cpu.gpr.get64(9), 0x1234);
}

#[test]
fn cop1_exchange_is_raw() {
    let mut cpu = machine();
    cpu.gpr.set32(8, 0x3f80_0000);
    load_program(
        &mut cpu,
        &[
            0x11 << 26 | 0x04 << 21 | 8 << 16 | 5 << 11, // mtc1 $t0, $f5
            0x11 << 26 | 0x00 << 21 | 9 << 16 | 5 << 11, // mfc1 $t1, $f5
        ],
    );
    step(&mut cpu, 2);
    assert_eq!(cpu.fpr[5], 0x3f80_0000);
    assert_eq!(cpu.gpr.get64(9), 0x3f80_0000);
}

#[test]
fn qmtc2_vsqi_qmfc2_through_cop2() {
    let mut cpu = machine();
    let vector = 0x44u128 << 96 | 0x33 << 64 | 0x22 << 32 | 0x11;
    cpu.gpr.set128(8, vector);
    cpu.gpr.set32(9, 0x10);
    // vsqi.xyzw $vf5, ($vi1++): special2 index 0x35
    let vsqi = 0x12 << 26 | (0x10 | 0xf) << 21 | 1 << 16 | 5 << 11 | 0xd << 6 | 0x3d;
    load_program(
        &mut cpu,
        &[
            0x12 << 26 | 0x05 << 21 | 8 << 16 | 5 << 11, // qmtc2 $t0, $vf5
            0x12 << 26 | 0x06 << 21 | 9 << 16 | 1 << 11, // ctc2 $t1, $vi1
            vsqi,
            0x12 << 26 | 0x01 << 21 | 10 << 16 | 5 << 11, // qmfc2 $t2, $vf5
        ],
    );
    step(&mut cpu, 4);
    assert_eq!(cpu.gpr.get128(10), vector);
    let bus = cpu.bus.borrow();
    assert_eq!(bus.vu0.vi(1), 0x11);
    assert_eq!(&bus.vu0.data[0x100..0x104], &[0x11, 0, 0, 0]);
    assert_eq!(&bus.vu0.data[0x10c..0x110], &[0x44, 0, 0, 0]);
}

#[test]
fn scratchpad_window_routes_to_spram() {
    let mut cpu = machine();
    cpu.gpr.set64(8, 0xabcd);
    cpu.gpr.set64(9, 0x7000_0100);
    load_program(
        &mut cpu,
        &[
            0x2b << 26 | 9 << 21 | 8 << 16,  // sw $t0, 0($t1)
            0x23 << 26 | 9 << 21 | 10 << 16, // lw $t2, 0($t1)
        ],
    );
    step(&mut cpu, 2);
    assert_eq!(cpu.gpr.get64(10), 0xabcd);
    assert_eq!(cpu.bus.borrow().spram[0x100], 0xcd);
}

#[test]
fn count_increments_every_step() {
    let mut cpu = machine();
    load_program(&mut cpu, &[0, 0, 0]);
    let before = cpu.cop0.count;
    step(&mut cpu, 3);
    assert_eq!(cpu.cop0.count, before + 3);
}

#[test]
fn dsra32_shifts_the_high_word() {
    let mut cpu = machine();
    cpu.gpr.set64(8, 0x8000_0000_0000_0000);
    load_program(&mut cpu, &[op_r(0x3f, 0, 8, 9, 0)]); // dsra32 $t1, $t0, 0
    step(&mut cpu, 1);
    assert_eq!(cpu.gpr.get64(9), 0xffff_ffff_8000_0000);
}

#[test]
fn lw_sign_extends_lwu_does_not() {
    let mut cpu = machine();
    cpu.bus.borrow_mut().write32(0x7100, 0x8000_0001).unwrap();
    cpu.gpr.set64(9, 0x8000_7100);
    load_program(
        &mut cpu,
        &[
            0x23 << 26 | 9 << 21 | 8 << 16,  // lw $t0
            0x27 << 26 | 9 << 21 | 10 << 16, // lwu $t2
        ],
    );
    step(&mut cpu, 2);
    assert_eq!(cpu.gpr.get64(8), 0xffff_ffff_8000_0001);
    assert_eq!(cpu.gpr.get64(10), 0x0000_0000_8000_0001);
}

#[test]
fn fetch_reads_through_the_bios_mapping() {
    let mut cpu = machine();
    // leave pc at the reset vector; BIOS is all zeroes, i.e. nops
    cpu.pc = 0xbfc0_0000;
    cpu.npc = 0xbfc0_0004;
    step(&mut cpu, 2);
    assert_eq!(cpu.pc, 0xbfc0_0008);
}
