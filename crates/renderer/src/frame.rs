//! Per-frame GPU state sequence.
//!
//! A frame is recorded as a flat, ordered list of state changes and draws
//! ([`FramePlan`]) before anything touches the device. The executor in
//! `lib.rs` replays it one command at a time through the same
//! [`AttributeState`] that [`FramePlan::validate`] uses, so a plan that
//! validates feeds each draw exactly the buffers listed here.

use glam::Mat4;
use thiserror::Error;
use wgpu::{VertexAttribute, VertexBufferLayout, VertexFormat, VertexStepMode};

/// Per-vertex input slots of the program.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum VertexSlot {
    Position = 0,
    TexCoord = 1,
}

impl VertexSlot {
    pub const COUNT: usize = 2;

    pub const ALL: [VertexSlot; Self::COUNT] = [VertexSlot::Position, VertexSlot::TexCoord];

    #[inline]
    pub fn index(self) -> u32 {
        self as u32
    }

    /// The only buffer whose contents match this slot.
    #[inline]
    pub fn buffer(self) -> BufferId {
        match self {
            VertexSlot::Position => BufferId::Positions,
            VertexSlot::TexCoord => BufferId::TexCoords,
        }
    }

    /// Layout the pipeline and buffer contents expect for this slot.
    #[inline]
    pub fn layout(self) -> AttributeLayout {
        match self {
            VertexSlot::Position => POSITION_LAYOUT,
            VertexSlot::TexCoord => TEXCOORD_LAYOUT,
        }
    }
}

/// GPU buffers created at startup.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BufferId {
    Positions,
    TexCoords,
}

/// How a bound buffer feeds a vertex slot. All components are `f32`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct AttributeLayout {
    pub components: u32,
    pub normalized: bool,
    /// Byte stride between vertices; 0 means tightly packed.
    pub stride: u32,
}

impl AttributeLayout {
    pub const fn packed_f32(components: u32) -> Self {
        Self {
            components,
            normalized: false,
            stride: 0,
        }
    }

    pub fn array_stride(&self) -> u64 {
        if self.stride == 0 {
            u64::from(self.components) * std::mem::size_of::<f32>() as u64
        } else {
            u64::from(self.stride)
        }
    }

    pub fn vertex_format(&self) -> Option<VertexFormat> {
        match (self.components, self.normalized) {
            (1, false) => Some(VertexFormat::Float32),
            (2, false) => Some(VertexFormat::Float32x2),
            (3, false) => Some(VertexFormat::Float32x3),
            (4, false) => Some(VertexFormat::Float32x4),
            _ => None,
        }
    }
}

pub const POSITION_LAYOUT: AttributeLayout = AttributeLayout::packed_f32(3);
pub const TEXCOORD_LAYOUT: AttributeLayout = AttributeLayout::packed_f32(2);

const POSITION_ATTRIBUTES: [VertexAttribute; 1] = wgpu::vertex_attr_array![0 => Float32x3];

/// Vertex buffer layout baked into the pipeline. Only the position slot is
/// consumed by the draw.
pub const POSITION_BUFFER_LAYOUT: VertexBufferLayout<'static> = VertexBufferLayout {
    array_stride: 3 * std::mem::size_of::<f32>() as u64,
    step_mode: VertexStepMode::Vertex,
    attributes: &POSITION_ATTRIBUTES,
};

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum FrameCommand {
    Clear { color: [f64; 4], depth: f32 },
    UseProgram,
    /// Column-major MVP for the transform uniform.
    UploadMvp([f32; 16]),
    ActiveTexture { unit: u32 },
    /// Point the sampler uniform at a texture unit.
    BindSampler { unit: u32 },
    EnableAttribute(VertexSlot),
    BindBuffer(BufferId),
    AttributePointer {
        slot: VertexSlot,
        layout: AttributeLayout,
    },
    DrawTriangles { first: u32, count: u32 },
    DisableAttribute(VertexSlot),
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum PlanError {
    #[error("frame must start by clearing the framebuffer")]
    MissingClear,
    #[error("command {index} sets a uniform before the program is active")]
    UniformWithoutProgram { index: usize },
    #[error("command {index} binds the sampler to unit {unit} but unit {active} is active")]
    SamplerUnitMismatch { index: usize, unit: u32, active: u32 },
    #[error("command {index} describes {slot:?} with no buffer bound")]
    PointerWithoutBuffer { index: usize, slot: VertexSlot },
    #[error("command {index} feeds {slot:?} from the {buffer:?} buffer")]
    BufferSlotMismatch {
        index: usize,
        slot: VertexSlot,
        buffer: BufferId,
    },
    #[error("command {index} describes {slot:?} as {layout:?}, expected {expected:?}")]
    LayoutMismatch {
        index: usize,
        slot: VertexSlot,
        layout: AttributeLayout,
        expected: AttributeLayout,
    },
    #[error("command {index} clears after the frame has started")]
    LateClear { index: usize },
    #[error("command {index} draws without an active program")]
    DrawWithoutProgram { index: usize },
    #[error("command {index} draws with enabled attribute {slot:?} not described")]
    UndescribedAttribute { index: usize, slot: VertexSlot },
    #[error("command {index} draws without the position attribute enabled")]
    DrawWithoutPositions { index: usize },
    #[error("command {index} draws {count} vertices, not whole triangles")]
    PartialTriangle { index: usize, count: u32 },
}

/// Vertex input state: the bound buffer, which slots are enabled, and which
/// buffer each described slot reads from.
///
/// Describing a slot does not depend on it being enabled; a slot feeds a
/// draw when it is both enabled and described at the time of the draw.
#[derive(Clone, Debug, Default)]
pub struct AttributeState {
    bound: Option<BufferId>,
    enabled: [bool; VertexSlot::COUNT],
    sources: [Option<BufferId>; VertexSlot::COUNT],
}

impl AttributeState {
    pub fn enable(&mut self, slot: VertexSlot) {
        self.enabled[slot as usize] = true;
    }

    pub fn disable(&mut self, slot: VertexSlot) {
        self.enabled[slot as usize] = false;
    }

    pub fn bind(&mut self, buffer: BufferId) {
        self.bound = Some(buffer);
    }

    /// Attach the bound buffer to `slot`.
    pub fn describe(
        &mut self,
        index: usize,
        slot: VertexSlot,
        layout: AttributeLayout,
    ) -> Result<(), PlanError> {
        let buffer = self
            .bound
            .ok_or(PlanError::PointerWithoutBuffer { index, slot })?;
        if buffer != slot.buffer() {
            return Err(PlanError::BufferSlotMismatch {
                index,
                slot,
                buffer,
            });
        }
        let expected = slot.layout();
        if layout != expected {
            return Err(PlanError::LayoutMismatch {
                index,
                slot,
                layout,
                expected,
            });
        }
        self.sources[slot as usize] = Some(buffer);
        Ok(())
    }

    /// Check the inputs of a draw at `index` and list the slots feeding it.
    pub fn draw_inputs(&self, index: usize) -> Result<Vec<(VertexSlot, BufferId)>, PlanError> {
        if !self.enabled[VertexSlot::Position as usize] {
            return Err(PlanError::DrawWithoutPositions { index });
        }
        let mut inputs = Vec::with_capacity(VertexSlot::COUNT);
        for slot in VertexSlot::ALL {
            if !self.enabled[slot as usize] {
                continue;
            }
            match self.sources[slot as usize] {
                Some(buffer) => inputs.push((slot, buffer)),
                None => return Err(PlanError::UndescribedAttribute { index, slot }),
            }
        }
        Ok(inputs)
    }
}

/// Inputs for one frame.
#[derive(Clone, Copy, Debug)]
pub struct FrameParams {
    pub clear_color: [f64; 4],
    pub mvp: Mat4,
    pub vertex_count: u32,
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct FramePlan {
    commands: Vec<FrameCommand>,
}

impl FramePlan {
    /// Record the fixed per-frame sequence.
    ///
    /// The texcoord slot is armed after the only draw and nothing consumes
    /// it; the sequence keeps that order on purpose so the rendered output is
    /// unchanged.
    pub fn record(params: &FrameParams) -> Self {
        use FrameCommand::*;

        let commands = vec![
            Clear {
                color: params.clear_color,
                depth: 1.0,
            },
            UseProgram,
            UploadMvp(params.mvp.to_cols_array()),
            ActiveTexture { unit: 0 },
            BindSampler { unit: 0 },
            EnableAttribute(VertexSlot::Position),
            BindBuffer(BufferId::Positions),
            AttributePointer {
                slot: VertexSlot::Position,
                layout: POSITION_LAYOUT,
            },
            DrawTriangles {
                first: 0,
                count: params.vertex_count,
            },
            DisableAttribute(VertexSlot::Position),
            EnableAttribute(VertexSlot::TexCoord),
            BindBuffer(BufferId::TexCoords),
            AttributePointer {
                slot: VertexSlot::TexCoord,
                layout: TEXCOORD_LAYOUT,
            },
        ];
        Self { commands }
    }

    pub fn commands(&self) -> &[FrameCommand] {
        &self.commands
    }

    pub fn draw_calls(&self) -> impl Iterator<Item = (u32, u32)> + '_ {
        self.commands.iter().filter_map(|cmd| match *cmd {
            FrameCommand::DrawTriangles { first, count } => Some((first, count)),
            _ => None,
        })
    }

    pub fn triangles_drawn(&self) -> u32 {
        self.draw_calls().map(|(_, count)| count / 3).sum()
    }

    /// Walk the sequence the way the GPU would and reject orderings that
    /// would draw with missing state.
    pub fn validate(&self) -> Result<(), PlanError> {
        if !matches!(self.commands.first(), Some(FrameCommand::Clear { .. })) {
            return Err(PlanError::MissingClear);
        }

        let mut program = false;
        let mut active_unit = 0;
        let mut attributes = AttributeState::default();

        for (index, cmd) in self.commands.iter().enumerate() {
            match *cmd {
                FrameCommand::Clear { .. } => {
                    if index > 0 {
                        return Err(PlanError::LateClear { index });
                    }
                }
                FrameCommand::UseProgram => program = true,
                FrameCommand::UploadMvp(_) => {
                    if !program {
                        return Err(PlanError::UniformWithoutProgram { index });
                    }
                }
                FrameCommand::ActiveTexture { unit } => active_unit = unit,
                FrameCommand::BindSampler { unit } => {
                    if !program {
                        return Err(PlanError::UniformWithoutProgram { index });
                    }
                    if unit != active_unit {
                        return Err(PlanError::SamplerUnitMismatch {
                            index,
                            unit,
                            active: active_unit,
                        });
                    }
                }
                FrameCommand::EnableAttribute(slot) => attributes.enable(slot),
                FrameCommand::DisableAttribute(slot) => attributes.disable(slot),
                FrameCommand::BindBuffer(id) => attributes.bind(id),
                FrameCommand::AttributePointer { slot, layout } => {
                    attributes.describe(index, slot, layout)?;
                }
                FrameCommand::DrawTriangles { count, .. } => {
                    if !program {
                        return Err(PlanError::DrawWithoutProgram { index });
                    }
                    attributes.draw_inputs(index)?;
                    if count % 3 != 0 {
                        return Err(PlanError::PartialTriangle { index, count });
                    }
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
impl FramePlan {
    fn from_commands(commands: Vec<FrameCommand>) -> Self {
        Self { commands }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use FrameCommand::*;

    fn cube_params() -> FrameParams {
        FrameParams {
            clear_color: [0.0, 0.0, 0.4, 0.0],
            mvp: Mat4::IDENTITY,
            vertex_count: 36,
        }
    }

    fn position_of(plan: &FramePlan, wanted: FrameCommand) -> usize {
        plan.commands()
            .iter()
            .position(|c| *c == wanted)
            .unwrap_or_else(|| panic!("{wanted:?} not recorded"))
    }

    #[test]
    fn recorded_frame_is_valid() {
        let plan = FramePlan::record(&cube_params());
        assert_eq!(plan.validate(), Ok(()));
        assert_eq!(plan.commands().len(), 13);
    }

    #[test]
    fn cube_draws_twelve_triangles_in_one_call() {
        let plan = FramePlan::record(&cube_params());
        assert_eq!(plan.draw_calls().collect::<Vec<_>>(), vec![(0, 36)]);
        assert_eq!(plan.triangles_drawn(), 12);
    }

    #[test]
    fn program_is_active_before_uniforms() {
        let plan = FramePlan::record(&cube_params());
        let program = position_of(&plan, UseProgram);
        assert!(program < position_of(&plan, UploadMvp(Mat4::IDENTITY.to_cols_array())));
        assert!(program < position_of(&plan, BindSampler { unit: 0 }));
        assert!(
            position_of(&plan, ActiveTexture { unit: 0 })
                < position_of(&plan, BindSampler { unit: 0 })
        );
    }

    #[test]
    fn mvp_is_uploaded_column_major() {
        let mvp = Mat4::from_translation(glam::vec3(1.0, 2.0, 3.0));
        let plan = FramePlan::record(&FrameParams {
            mvp,
            ..cube_params()
        });
        let uploaded = plan
            .commands()
            .iter()
            .find_map(|c| match c {
                UploadMvp(m) => Some(*m),
                _ => None,
            })
            .expect("mvp upload");
        assert_eq!(&uploaded[12..15], &[1.0, 2.0, 3.0]);
    }

    #[test]
    fn positions_are_bound_and_described_before_the_draw() {
        let plan = FramePlan::record(&cube_params());
        let draw = position_of(&plan, DrawTriangles { first: 0, count: 36 });
        assert!(position_of(&plan, EnableAttribute(VertexSlot::Position)) < draw);
        assert!(position_of(&plan, BindBuffer(BufferId::Positions)) < draw);
        assert!(
            position_of(
                &plan,
                AttributePointer {
                    slot: VertexSlot::Position,
                    layout: POSITION_LAYOUT
                }
            ) < draw
        );
        assert!(position_of(&plan, DisableAttribute(VertexSlot::Position)) > draw);
    }

    #[test]
    fn texcoords_are_armed_after_the_last_draw() {
        let plan = FramePlan::record(&cube_params());
        let draw = position_of(&plan, DrawTriangles { first: 0, count: 36 });
        let armed = position_of(
            &plan,
            AttributePointer {
                slot: VertexSlot::TexCoord,
                layout: TEXCOORD_LAYOUT,
            },
        );
        assert!(armed > draw);
        assert_eq!(plan.commands().last(), plan.commands().get(armed));
        assert_eq!(plan.draw_calls().count(), 1);
    }

    #[test]
    fn layouts_are_tightly_packed_floats() {
        assert_eq!(POSITION_LAYOUT.array_stride(), 12);
        assert_eq!(TEXCOORD_LAYOUT.array_stride(), 8);
        assert_eq!(POSITION_LAYOUT.vertex_format(), Some(VertexFormat::Float32x3));
        assert_eq!(TEXCOORD_LAYOUT.vertex_format(), Some(VertexFormat::Float32x2));
        assert_eq!(POSITION_BUFFER_LAYOUT.array_stride, POSITION_LAYOUT.array_stride());
        assert!(!POSITION_LAYOUT.normalized);
    }

    #[test]
    fn rejects_out_of_order_sequences() {
        let clear = Clear {
            color: [0.0; 4],
            depth: 1.0,
        };
        let draw = DrawTriangles { first: 0, count: 3 };
        let pointer = AttributePointer {
            slot: VertexSlot::Position,
            layout: POSITION_LAYOUT,
        };

        let no_clear = FramePlan::from_commands(vec![UseProgram]);
        assert_eq!(no_clear.validate(), Err(PlanError::MissingClear));

        let early_uniform = FramePlan::from_commands(vec![clear, UploadMvp([0.0; 16]), UseProgram]);
        assert_eq!(
            early_uniform.validate(),
            Err(PlanError::UniformWithoutProgram { index: 1 })
        );

        let unbound = FramePlan::from_commands(vec![
            clear,
            UseProgram,
            EnableAttribute(VertexSlot::Position),
            pointer,
        ]);
        assert_eq!(
            unbound.validate(),
            Err(PlanError::PointerWithoutBuffer {
                index: 3,
                slot: VertexSlot::Position
            })
        );

        let undescribed = FramePlan::from_commands(vec![
            clear,
            UseProgram,
            EnableAttribute(VertexSlot::Position),
            BindBuffer(BufferId::Positions),
            draw,
        ]);
        assert_eq!(
            undescribed.validate(),
            Err(PlanError::UndescribedAttribute {
                index: 4,
                slot: VertexSlot::Position
            })
        );

        let disabled = FramePlan::from_commands(vec![
            clear,
            UseProgram,
            BindBuffer(BufferId::Positions),
            pointer,
            draw,
        ]);
        assert_eq!(
            disabled.validate(),
            Err(PlanError::DrawWithoutPositions { index: 4 })
        );

        let wrong_unit = FramePlan::from_commands(vec![
            clear,
            UseProgram,
            ActiveTexture { unit: 1 },
            BindSampler { unit: 0 },
        ]);
        assert!(matches!(
            wrong_unit.validate(),
            Err(PlanError::SamplerUnitMismatch { .. })
        ));
    }

    #[test]
    fn position_described_with_two_floats_is_rejected() {
        let plan = FramePlan::from_commands(vec![
            Clear {
                color: [0.0; 4],
                depth: 1.0,
            },
            UseProgram,
            EnableAttribute(VertexSlot::Position),
            BindBuffer(BufferId::Positions),
            AttributePointer {
                slot: VertexSlot::Position,
                layout: AttributeLayout::packed_f32(2),
            },
            DrawTriangles { first: 0, count: 3 },
        ]);
        assert_eq!(
            plan.validate(),
            Err(PlanError::LayoutMismatch {
                index: 4,
                slot: VertexSlot::Position,
                layout: AttributeLayout::packed_f32(2),
                expected: POSITION_LAYOUT,
            })
        );
    }

    #[test]
    fn uv_buffer_cannot_feed_positions() {
        let plan = FramePlan::from_commands(vec![
            Clear {
                color: [0.0; 4],
                depth: 1.0,
            },
            UseProgram,
            EnableAttribute(VertexSlot::Position),
            BindBuffer(BufferId::TexCoords),
            AttributePointer {
                slot: VertexSlot::Position,
                layout: POSITION_LAYOUT,
            },
            DrawTriangles { first: 0, count: 3 },
        ]);
        assert_eq!(
            plan.validate(),
            Err(PlanError::BufferSlotMismatch {
                index: 4,
                slot: VertexSlot::Position,
                buffer: BufferId::TexCoords,
            })
        );
    }

    #[test]
    fn pointer_before_enable_still_feeds_the_draw() {
        let commands = vec![
            Clear {
                color: [0.0; 4],
                depth: 1.0,
            },
            UseProgram,
            BindBuffer(BufferId::Positions),
            AttributePointer {
                slot: VertexSlot::Position,
                layout: POSITION_LAYOUT,
            },
            EnableAttribute(VertexSlot::Position),
            DrawTriangles { first: 0, count: 3 },
        ];
        let plan = FramePlan::from_commands(commands);
        assert_eq!(plan.validate(), Ok(()));

        let mut state = AttributeState::default();
        state.bind(BufferId::Positions);
        state.describe(3, VertexSlot::Position, POSITION_LAYOUT).unwrap();
        state.enable(VertexSlot::Position);
        assert_eq!(
            state.draw_inputs(5),
            Ok(vec![(VertexSlot::Position, BufferId::Positions)])
        );
    }

    #[test]
    fn disabled_slots_do_not_feed_the_draw() {
        let mut state = AttributeState::default();
        state.enable(VertexSlot::Position);
        state.bind(BufferId::Positions);
        state.describe(0, VertexSlot::Position, POSITION_LAYOUT).unwrap();
        state.bind(BufferId::TexCoords);
        state.describe(1, VertexSlot::TexCoord, TEXCOORD_LAYOUT).unwrap();
        assert_eq!(
            state.draw_inputs(2),
            Ok(vec![(VertexSlot::Position, BufferId::Positions)])
        );

        state.enable(VertexSlot::TexCoord);
        assert_eq!(state.draw_inputs(3).map(|inputs| inputs.len()), Ok(2));
    }

    #[test]
    fn clear_after_the_first_command_is_rejected() {
        let clear = Clear {
            color: [0.0; 4],
            depth: 1.0,
        };
        let plan = FramePlan::from_commands(vec![clear, UseProgram, clear]);
        assert_eq!(plan.validate(), Err(PlanError::LateClear { index: 2 }));
    }

    #[test]
    fn partial_triangle_is_rejected() {
        let plan = FramePlan::record(&FrameParams {
            vertex_count: 35,
            ..cube_params()
        });
        assert_eq!(
            plan.validate(),
            Err(PlanError::PartialTriangle { index: 8, count: 35 })
        );
    }
}
