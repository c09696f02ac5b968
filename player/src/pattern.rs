//! Built-in test pattern standing in for an emulator core
//!
//! Scrolls a colour gradient and plays a steady tone per channel, producing
//! exactly `sample_rate` samples per channel for every `frequency` frames.

use std::f32::consts::TAU;

use framesync_core::Emulator;

pub const WIDTH: usize = 320;
pub const HEIGHT: usize = 224;

/// Extra room per channel beyond one frame of samples
const SAMPLE_HEADROOM: usize = 100;

/// Tone of the first channel in Hz; each further channel is a fifth above
const BASE_TONE: f32 = 440.0;
const AMPLITUDE: f32 = 0.2;

pub struct TestPattern {
    frame: u64,
    sample_rate: u32,
    frequency: u32,
    /// Fractional samples carried between frames, in units of 1/frequency
    carry: u32,
    phases: Vec<f32>,
    pixels: Vec<u8>,
    channels: Vec<Vec<f32>>,
}

impl TestPattern {
    /// Pattern producing `channels` audio channels
    pub fn new(sample_rate: u32, frequency: u32, channels: usize) -> Self {
        let mut pattern = Self {
            frame: 0,
            sample_rate,
            frequency,
            carry: 0,
            phases: vec![0.0; channels],
            pixels: vec![0; WIDTH * HEIGHT * 4],
            channels: vec![Vec::new(); channels],
        };
        pattern.resize_channels();
        pattern
    }

    /// Follow the rate the audio output actually runs at
    pub fn set_sample_rate(&mut self, sample_rate: u32) {
        if sample_rate != self.sample_rate {
            self.sample_rate = sample_rate;
            self.carry = 0;
            self.resize_channels();
        }
    }

    pub fn frame(&self) -> u64 {
        self.frame
    }

    fn resize_channels(&mut self) {
        let len = (self.sample_rate / self.frequency) as usize + SAMPLE_HEADROOM;
        for channel in &mut self.channels {
            channel.resize(len, 0.0);
        }
    }

    fn samples_this_frame(&mut self) -> usize {
        self.carry += self.sample_rate;
        let samples = self.carry / self.frequency;
        self.carry %= self.frequency;
        samples as usize
    }

    fn draw(&mut self) {
        let shift = self.frame as usize;
        for (index, pixel) in self.pixels.chunks_exact_mut(4).enumerate() {
            let x = index % WIDTH;
            let y = index / WIDTH;
            pixel[0] = (x + shift) as u8;
            pixel[1] = (y * 255 / HEIGHT) as u8;
            pixel[2] = (shift / 2) as u8;
            pixel[3] = 0xFF;
        }
    }
}

impl Emulator for TestPattern {
    fn step(&mut self) -> usize {
        self.frame += 1;
        self.draw();

        let samples = self.samples_this_frame();
        let mut tone = BASE_TONE;
        for (channel, phase) in self.channels.iter_mut().zip(&mut self.phases) {
            let step = TAU * tone / self.sample_rate as f32;
            tone *= 1.5;
            for sample in &mut channel[..samples] {
                *sample = phase.sin() * AMPLITUDE;
                *phase = (*phase + step) % TAU;
            }
        }
        samples
    }

    fn frame_buffer(&self) -> &[u8] {
        &self.pixels
    }

    fn audio_channel(&self, channel: usize) -> &[f32] {
        &self.channels[channel]
    }
}
