//! Scene to command sequence
//!
//! Walks every emitting layer once per pass and turns its items into rapid
//! and cut commands. The head position is threaded through as an explicit
//! value: every compile step takes the position it starts from and returns
//! where it left the head, so the output is one continuous traversal.

use tracing::{debug, info, warn};

use crate::command::{Command, CommandSequence, CutMode, PassContext, return_home};
use crate::config::MachineSettings;
use crate::geometry::{SAMPLE_STEP, sample_path};
use crate::raster::compile_raster;
use crate::scene::{Item, Layer, Path, Point, Scene, XForm};

/// Compile a whole scene into a time-annotated command sequence.
///
/// A scene with nothing to emit yields an empty sequence.
pub fn compile_scene(scene: &Scene, machine: &MachineSettings) -> CommandSequence {
    let rapid_speed = machine.rapid_speed();
    if scene.workspace.width > machine.width || scene.workspace.height > machine.height {
        warn!(
            workspace_width = scene.workspace.width,
            workspace_height = scene.workspace.height,
            bed_width = machine.width,
            bed_height = machine.height,
            "workspace is larger than the machine bed"
        );
    }
    let mut commands = Vec::new();
    let mut pos = Point::ORIGIN;

    for layer in &scene.layers {
        pos = compile_layer(layer, rapid_speed, &mut commands, pos);
    }

    if pos != Point::ORIGIN {
        commands.push(return_home(pos, rapid_speed));
    }

    let seq = CommandSequence::new(commands);
    if let Some(extents) = seq.extents()
        && !machine.bed_contains(&extents)
    {
        warn!(
            min_x = extents.min_x,
            min_y = extents.min_y,
            max_x = extents.max_x,
            max_y = extents.max_y,
            "job leaves the machine bed"
        );
    }
    info!(
        commands = seq.len(),
        seconds = seq.total_time(),
        "compiled scene"
    );
    seq
}

/// Compile all passes of one layer, skipping hidden or non-output layers
pub fn compile_layer(
    layer: &Layer,
    rapid_speed: f64,
    out: &mut Vec<Command>,
    mut pos: Point,
) -> Point {
    if !layer.settings.is_emitting() {
        debug!(layer = %layer.name, "layer skipped");
        return pos;
    }

    let passes = layer.settings.passes.max(1);
    for pass in 1..=passes {
        let ctx = PassContext {
            layer: &layer.name,
            settings: &layer.settings,
            pass,
            total_passes: passes,
            rapid_speed,
        };
        let before = out.len();
        for item in &layer.items {
            pos = compile_item(item, &XForm::identity(), &ctx, out, pos);
        }
        debug!(
            layer = %layer.name,
            pass,
            commands = out.len() - before,
            "compiled pass"
        );
    }
    pos
}

/// Compile one item under the accumulated `parent` transform
pub fn compile_item(
    item: &Item,
    parent: &XForm,
    ctx: &PassContext<'_>,
    out: &mut Vec<Command>,
    mut pos: Point,
) -> Point {
    match item {
        Item::Path(path) => compile_path(&path.baked(parent), ctx, out, pos),
        Item::Compound(compound) => {
            let xform = parent.compose(&compound.xform);
            for sub in &compound.paths {
                pos = compile_path(&sub.baked(&xform), ctx, out, pos);
            }
            pos
        }
        Item::Group(group) => {
            let xform = parent.compose(&group.xform);
            for child in &group.children {
                pos = compile_item(child, &xform, ctx, out, pos);
            }
            pos
        }
        Item::Raster(image) => compile_raster(image, parent, ctx, out, pos),
    }
}

/// Rapid to the path start, then cut through its samples. Degenerate paths
/// emit nothing.
pub fn compile_path(
    path: &Path,
    ctx: &PassContext<'_>,
    out: &mut Vec<Command>,
    pos: Point,
) -> Point {
    let points = sample_path(path, SAMPLE_STEP);
    let Some((&start, rest)) = points.split_first() else {
        return pos;
    };

    let mut pos = ctx.rapid(out, pos, start);
    for &pt in rest {
        pos = ctx.cut(out, pos, pt, ctx.settings.power, CutMode::Vector);
    }
    pos
}
