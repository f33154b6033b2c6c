//! Tape tests driven through the CPU.
//!
//! Each program sits in a custom ROM and jumps to the 48K ROM's tape entry
//! points, so the tape device sees the same program counter values it would
//! see with the real ROM.

use emu_core::{CancellationToken, VirtualClock};
use emu_spectrum::tape::{BytesContentProvider, TzxSaveProvider};
use emu_spectrum::{
    EmulationMode, ExecuteCycleOptions, MachineError, Spectrum48, SpectrumConfig, TapeConfig,
    TapeError, TapeMode,
};
use format_tzx::{Pulse, TzxFile, encode_pulses};

const SA_BYTES: usize = 0x04C2;
const LD_BYTES: usize = 0x056C;

/// ROM that jumps to `entry`, runs `body` there, and halts at the RST 08
/// error restart.
fn tape_rom(entry: usize, body: &[u8]) -> Vec<u8> {
    let mut rom = vec![0u8; 0x0600];
    rom[..3].copy_from_slice(&[0xC3, entry as u8, (entry >> 8) as u8]);
    rom[0x0008] = 0x76;
    rom[entry..entry + body.len()].copy_from_slice(body);
    rom
}

fn make_spectrum(rom: Vec<u8>, tape: TapeConfig) -> Spectrum48<VirtualClock> {
    let config = SpectrumConfig {
        rom,
        tape,
        ..SpectrumConfig::default()
    };
    Spectrum48::new(&config, VirtualClock::new(1_000_000)).expect("ROM fits")
}

fn run_until_halt(spectrum: &mut Spectrum48<VirtualClock>) -> Result<bool, MachineError> {
    spectrum.run_cycle(
        &CancellationToken::new(),
        ExecuteCycleOptions::new(EmulationMode::UntilHalt),
    )
}

// ---------------------------------------------------------------------------
// Save
// ---------------------------------------------------------------------------

/// LD A,n; OUT ($FE),A for each MIC level, then RST 08.
fn mic_program(levels: &[bool]) -> Vec<u8> {
    let mut body = Vec::new();
    for &level in levels {
        body.extend_from_slice(&[0x3E, if level { 0x08 } else { 0x00 }, 0xD3, 0xFE]);
    }
    body.push(0xCF);
    body
}

fn record(levels: &[bool]) -> (Spectrum48<VirtualClock>, TzxSaveProvider) {
    let saved = TzxSaveProvider::new();
    let mut spectrum = make_spectrum(tape_rom(SA_BYTES, &mic_program(levels)), TapeConfig::default());
    spectrum.tape_mut().set_save_provider(Box::new(saved.clone()));
    assert!(run_until_halt(&mut spectrum).expect("run"));
    (spectrum, saved)
}

#[test]
fn save_records_mic_edges() {
    let (spectrum, saved) = record(&[false, true, false]);
    let tape = spectrum.tape();
    assert_eq!(tape.mode(), TapeMode::Passive);
    // JP takes 10 tacts; recording starts when it lands on SA-BYTES.
    assert_eq!(tape.save_start_tact(), 10);

    let pulses = tape.recorded_pulses();
    assert_eq!(pulses.len(), 3);
    assert_eq!(
        pulses.iter().map(|p| p.level).collect::<Vec<_>>(),
        vec![true, false, true]
    );
    // LD A,n (7) + OUT (n),A (11) between consecutive writes.
    assert_eq!(pulses[1].length, 18);
    assert_eq!(pulses[2].length, 18);
    assert_eq!(saved.recordings().len(), 1);
}

#[test]
fn repeated_mic_level_adds_no_pulse() {
    let (spectrum, _) = record(&[false, false, false, true]);
    let pulses = spectrum.tape().recorded_pulses();
    assert_eq!(pulses.len(), 2);
    assert_eq!(pulses[1], Pulse { level: false, length: 3 * 18 });
}

#[test]
fn recording_round_trips_through_playback() {
    let (spectrum, saved) = record(&[false, true, false, true, false]);
    let recorded = spectrum.tape().recorded_pulses().to_vec();
    let image = saved.last_recording().expect("recording");

    // The saved image flattens back to the recorded signal.
    let file = TzxFile::parse(&image).expect("valid TZX");
    assert_eq!(file.signal(3_500_000), recorded);

    // Played back from any start tact, every tact of every pulse matches.
    let mut player = make_spectrum(tape_rom(LD_BYTES, &[0x76]), TapeConfig::default());
    player
        .tape_mut()
        .set_content_provider(Box::new(BytesContentProvider::new(image)));
    let start = 1_000;
    player
        .tape_mut()
        .set_tape_mode(LD_BYTES as u16, start)
        .expect("enter load");
    assert_eq!(player.tape().mode(), TapeMode::Load);

    let bus = player.bus_mut();
    let mut tact = start;
    for pulse in &recorded {
        for offset in [0, pulse.length / 2, pulse.length - 1] {
            assert_eq!(
                bus.tape.get_ear_bit(tact + offset, &mut bus.beeper),
                pulse.level,
                "tact {}",
                tact + offset
            );
        }
        tact += pulse.length;
    }
}

#[test]
fn silence_ends_recording() {
    // MIC low once, then spin.
    let body = [0x3E, 0x00, 0xD3, 0xFE, 0x18, 0xFE];
    let tape = TapeConfig {
        save_silence_timeout: 100_000,
        ..TapeConfig::default()
    };
    let saved = TzxSaveProvider::new();
    let mut spectrum = make_spectrum(tape_rom(SA_BYTES, &body), tape);
    spectrum.tape_mut().set_save_provider(Box::new(saved.clone()));
    let token = CancellationToken::new();

    spectrum
        .run_cycle(&token, ExecuteCycleOptions::new(EmulationMode::UntilFrameEnds))
        .expect("first frame");
    assert_eq!(spectrum.tape().mode(), TapeMode::Save);

    spectrum
        .run_cycle(&token, ExecuteCycleOptions::new(EmulationMode::UntilFrameEnds))
        .expect("second frame");
    assert_eq!(spectrum.tape().mode(), TapeMode::Passive);
    assert_eq!(spectrum.tape().recorded_pulses().len(), 1);
    assert_eq!(saved.recordings().len(), 1);
}

// ---------------------------------------------------------------------------
// Load
// ---------------------------------------------------------------------------

/// IN A,($FE); HALT
const READ_EAR: [u8; 3] = [0xDB, 0xFE, 0x76];

#[test]
fn load_drives_ear_bit() {
    let image = encode_pulses(&[
        Pulse { level: false, length: 5_000 },
        Pulse { level: true, length: 5_000 },
    ])
    .to_bytes();
    let mut spectrum = make_spectrum(tape_rom(LD_BYTES, &READ_EAR), TapeConfig::default());
    spectrum
        .tape_mut()
        .set_content_provider(Box::new(BytesContentProvider::new(image)));

    assert!(run_until_halt(&mut spectrum).expect("run"));
    assert_eq!(spectrum.tape().mode(), TapeMode::Load);
    assert_eq!(spectrum.cpu().regs().a & 0x40, 0x00);
}

#[test]
fn load_without_content_stays_idle() {
    let mut spectrum = make_spectrum(tape_rom(LD_BYTES, &READ_EAR), TapeConfig::default());
    assert!(run_until_halt(&mut spectrum).expect("run"));
    assert_eq!(spectrum.tape().mode(), TapeMode::Passive);
    assert_eq!(spectrum.cpu().regs().a & 0x40, 0x40);
}

#[test]
fn malformed_content_fails_the_run() {
    let mut spectrum = make_spectrum(tape_rom(LD_BYTES, &READ_EAR), TapeConfig::default());
    spectrum
        .tape_mut()
        .set_content_provider(Box::new(BytesContentProvider::new(b"ZXTape!\x1A\x01\x14\x99".to_vec())));

    let err = run_until_halt(&mut spectrum).expect_err("unknown block");
    assert!(matches!(
        err,
        MachineError::Tape(TapeError::Format(format_tzx::TzxError::UnknownBlock { id: 0x99, .. }))
    ));
    assert_eq!(spectrum.tape().mode(), TapeMode::Passive);
}

#[test]
fn playback_stops_at_end_of_tape() {
    let image = encode_pulses(&[Pulse { level: true, length: 100 }]).to_bytes();
    // IN A,($FE) in a loop long enough to run past the signal.
    let body = [0x06, 0x20, 0xDB, 0xFE, 0x10, 0xFC, 0x76];
    let mut spectrum = make_spectrum(tape_rom(LD_BYTES, &body), TapeConfig::default());
    spectrum
        .tape_mut()
        .set_content_provider(Box::new(BytesContentProvider::new(image)));

    assert!(run_until_halt(&mut spectrum).expect("run"));
    assert_eq!(spectrum.tape().mode(), TapeMode::Passive);
}
