//! Classical Boolean operators composed from the gate layer
//!
//! Outputs land in a named qubit that is first forced to a known value;
//! when the output collides with an input, a fresh ancilla is cohered in,
//! written through, swapped into place, and disposed. No qubit outside the
//! named arguments is altered.

use super::CoherentRegister;
use crate::config::RegisterConfig;
use crate::error::Result;

impl CoherentRegister {
    fn with_ancilla<F>(&mut self, ancilla_value: usize, body: F) -> Result<()>
    where
        F: FnOnce(&mut Self, usize) -> Result<()>,
    {
        let mut extra = CoherentRegister::with_service(
            1,
            ancilla_value,
            RegisterConfig::default(),
            std::sync::Arc::clone(&self.service),
        )?;
        self.cohere(&mut extra)?;
        let last = self.qubit_count - 1;
        body(self, last)?;
        self.dispose(last, 1)
    }

    /// AND of two qubits into `output`
    pub fn and(&mut self, input1: usize, input2: usize, output: usize) -> Result<()> {
        self.check_bit(input1)?;
        self.check_bit(input2)?;
        self.check_bit(output)?;
        if input1 == input2 && input2 == output {
            // x AND x = x
            return Ok(());
        }
        if input1 == output || input2 == output {
            return self.with_ancilla(0, |reg, scratch| {
                reg.ccnot(input1, input2, scratch)?;
                reg.swap(scratch, output)
            });
        }
        self.set_bit(output, false)?;
        if input1 == input2 {
            self.cnot(input1, output)
        } else {
            self.ccnot(input1, input2, output)
        }
    }

    /// OR of two qubits into `output`
    pub fn or(&mut self, input1: usize, input2: usize, output: usize) -> Result<()> {
        self.check_bit(input1)?;
        self.check_bit(input2)?;
        self.check_bit(output)?;
        if input1 == input2 && input2 == output {
            return Ok(());
        }
        if input1 == output || input2 == output {
            return self.with_ancilla(1, |reg, scratch| {
                reg.anti_ccnot(input1, input2, scratch)?;
                reg.swap(scratch, output)
            });
        }
        self.set_bit(output, true)?;
        if input1 == input2 {
            self.anti_cnot(input1, output)
        } else {
            self.anti_ccnot(input1, input2, output)
        }
    }

    /// XOR of two qubits into `output`
    pub fn xor(&mut self, input1: usize, input2: usize, output: usize) -> Result<()> {
        self.check_bit(input1)?;
        self.check_bit(input2)?;
        self.check_bit(output)?;
        if input1 == input2 && input2 == output {
            // x XOR x = 0
            return self.set_bit(output, false);
        }
        if input1 == output || input2 == output {
            return self.with_ancilla(0, |reg, scratch| {
                reg.cnot(input1, scratch)?;
                reg.cnot(input2, scratch)?;
                reg.swap(scratch, output)
            });
        }
        self.set_bit(output, false)?;
        self.cnot(input1, output)?;
        self.cnot(input2, output)
    }

    /// AND of a qubit with a classical bit into `output`
    pub fn cl_and(&mut self, input: usize, classical: bool, output: usize) -> Result<()> {
        self.check_bit(input)?;
        self.check_bit(output)?;
        if input == output {
            // x AND 1 = x; x AND 0 = 0
            if !classical {
                self.set_bit(output, false)?;
            }
            return Ok(());
        }
        self.set_bit(output, false)?;
        if classical {
            self.cnot(input, output)?;
        }
        Ok(())
    }

    /// OR of a qubit with a classical bit into `output`
    pub fn cl_or(&mut self, input: usize, classical: bool, output: usize) -> Result<()> {
        self.check_bit(input)?;
        self.check_bit(output)?;
        if input == output {
            // x OR 0 = x; x OR 1 = 1
            if classical {
                self.set_bit(output, true)?;
            }
            return Ok(());
        }
        if classical {
            self.set_bit(output, true)?;
        } else {
            self.set_bit(output, false)?;
            self.cnot(input, output)?;
        }
        Ok(())
    }

    /// XOR of a qubit with a classical bit into `output`
    pub fn cl_xor(&mut self, input: usize, classical: bool, output: usize) -> Result<()> {
        self.check_bit(input)?;
        self.check_bit(output)?;
        if input == output {
            // x XOR 1 = not x; x XOR 0 = x
            if classical {
                self.x(output)?;
            }
            return Ok(());
        }
        self.set_bit(output, classical)?;
        self.cnot(input, output)?;
        Ok(())
    }

    /// Bitwise AND of two qubit ranges into an output range
    pub fn and_range(
        &mut self,
        input1_start: usize,
        input2_start: usize,
        output_start: usize,
        length: usize,
    ) -> Result<()> {
        self.check_range(input1_start, length)?;
        self.check_range(input2_start, length)?;
        self.check_range(output_start, length)?;
        if input1_start == input2_start && input2_start == output_start {
            return Ok(());
        }
        for i in 0..length {
            self.and(input1_start + i, input2_start + i, output_start + i)?;
        }
        Ok(())
    }

    /// Bitwise OR of two qubit ranges into an output range
    pub fn or_range(
        &mut self,
        input1_start: usize,
        input2_start: usize,
        output_start: usize,
        length: usize,
    ) -> Result<()> {
        self.check_range(input1_start, length)?;
        self.check_range(input2_start, length)?;
        self.check_range(output_start, length)?;
        if input1_start == input2_start && input2_start == output_start {
            return Ok(());
        }
        for i in 0..length {
            self.or(input1_start + i, input2_start + i, output_start + i)?;
        }
        Ok(())
    }

    /// Bitwise XOR of two qubit ranges into an output range
    pub fn xor_range(
        &mut self,
        input1_start: usize,
        input2_start: usize,
        output_start: usize,
        length: usize,
    ) -> Result<()> {
        self.check_range(input1_start, length)?;
        self.check_range(input2_start, length)?;
        self.check_range(output_start, length)?;
        if input1_start == input2_start && input2_start == output_start {
            return Ok(());
        }
        for i in 0..length {
            self.xor(input1_start + i, input2_start + i, output_start + i)?;
        }
        Ok(())
    }

    /// Bitwise AND of a qubit range with a classical word
    pub fn cl_and_range(
        &mut self,
        input_start: usize,
        classical: usize,
        output_start: usize,
        length: usize,
    ) -> Result<()> {
        self.check_range(input_start, length)?;
        self.check_range(output_start, length)?;
        for i in 0..length {
            let bit = classical & (1 << i) != 0;
            self.cl_and(input_start + i, bit, output_start + i)?;
        }
        Ok(())
    }

    /// Bitwise OR of a qubit range with a classical word
    pub fn cl_or_range(
        &mut self,
        input_start: usize,
        classical: usize,
        output_start: usize,
        length: usize,
    ) -> Result<()> {
        self.check_range(input_start, length)?;
        self.check_range(output_start, length)?;
        for i in 0..length {
            let bit = classical & (1 << i) != 0;
            self.cl_or(input_start + i, bit, output_start + i)?;
        }
        Ok(())
    }

    /// Bitwise XOR of a qubit range with a classical word
    pub fn cl_xor_range(
        &mut self,
        input_start: usize,
        classical: usize,
        output_start: usize,
        length: usize,
    ) -> Result<()> {
        self.check_range(input_start, length)?;
        self.check_range(output_start, length)?;
        for i in 0..length {
            let bit = classical & (1 << i) != 0;
            self.cl_xor(input_start + i, bit, output_start + i)?;
        }
        Ok(())
    }
}
