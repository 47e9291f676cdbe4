//! # 切分模块
//!
//! ## 设计思路
//!
//! 给定位图与切分参数，计算互不重叠、尺寸一致的矩形网格，并把每个矩形的像素
//! 原样复制为一张独立的 PNG。整个过程是纯函数：同样的输入总是得到同样的矩形与像素。
//!
//! ## 实现思路
//!
//! 1. 解析行列数：`tile_width_px` 覆盖列数（向上取整），`tile_height_px` 覆盖行数；最少为 1。
//! 2. 分块尺寸向下取整：`w = W / columns`，`h = H / rows`。
//!    右侧 / 底部多出的像素不属于任何分块。
//! 3. 分块尺寸为 0 时按 `DegeneratePolicy` 报错或收缩行列数。
//! 4. 行优先遍历，`crop_imm` 复制像素后编码 PNG。

use image::imageops;

use super::source::encode_png;
use super::{
    DEFAULT_MAX_PIECES, DecodedBitmap, DegeneratePolicy, PieceArtifact, SplitError, TileGrid,
    TileLayout, TileSpec,
};

/// 由位图尺寸与切分参数解析网格几何信息。
pub fn resolve_layout(
    width: u32,
    height: u32,
    spec: &TileSpec,
    policy: DegeneratePolicy,
) -> Result<TileLayout, SplitError> {
    let mut columns = match spec.tile_width_px.filter(|px| *px > 0) {
        Some(px) => width.div_ceil(px),
        None => spec.columns,
    }
    .max(1);
    let mut rows = match spec.tile_height_px.filter(|px| *px > 0) {
        Some(px) => height.div_ceil(px),
        None => spec.rows,
    }
    .max(1);

    if policy == DegeneratePolicy::Clamp && (columns > width || rows > height) {
        let clamped_columns = columns.min(width).max(1);
        let clamped_rows = rows.min(height).max(1);
        log::warn!(
            "⚠️ 行列数超过图片像素数，已收缩：{}x{} -> {}x{}（图片 {}x{}）",
            rows,
            columns,
            clamped_rows,
            clamped_columns,
            width,
            height
        );
        columns = clamped_columns;
        rows = clamped_rows;
    }

    let piece_width = width / columns;
    let piece_height = height / rows;

    if piece_width == 0 || piece_height == 0 {
        return Err(SplitError::DegenerateTile(format!(
            "{} 行 x {} 列无法切分 {}x{} 的图片（分块尺寸 {}x{}）",
            rows, columns, width, height, piece_width, piece_height
        )));
    }

    Ok(TileLayout {
        rows,
        columns,
        piece_width,
        piece_height,
    })
}

/// 将位图切分为行优先排列的 PNG 分块。
///
/// 分块总数受 [`DEFAULT_MAX_PIECES`] 限制；需要其他上限时使用 [`compute_tiles_limited`]。
pub fn compute_tiles(
    bitmap: &DecodedBitmap,
    spec: &TileSpec,
    policy: DegeneratePolicy,
) -> Result<TileGrid, SplitError> {
    compute_tiles_limited(bitmap, spec, policy, DEFAULT_MAX_PIECES)
}

/// 与 [`compute_tiles`] 相同，但限制分块总数。
pub fn compute_tiles_limited(
    bitmap: &DecodedBitmap,
    spec: &TileSpec,
    policy: DegeneratePolicy,
    max_pieces: u64,
) -> Result<TileGrid, SplitError> {
    let (width, height) = (bitmap.width(), bitmap.height());
    let layout = resolve_layout(width, height, spec, policy)?;

    if layout.piece_count() > max_pieces {
        return Err(SplitError::ResourceLimit(format!(
            "分块数量过多：{}（限制：{}）",
            layout.piece_count(),
            max_pieces
        )));
    }

    let (covered_width, covered_height) = layout.covered_extent();
    if covered_width < width || covered_height < height {
        log::debug!(
            "✂️ 丢弃边缘像素：右侧 {}px，底部 {}px",
            width - covered_width,
            height - covered_height
        );
    }

    let mut pieces = Vec::with_capacity(layout.piece_count() as usize);
    for (index, rect) in layout.rects().enumerate() {
        let view = imageops::crop_imm(bitmap.pixels(), rect.x, rect.y, rect.width, rect.height);
        let png = encode_png(&view.to_image())?;

        pieces.push(PieceArtifact {
            index,
            row: rect.y / layout.piece_height,
            column: rect.x / layout.piece_width,
            rect,
            png,
        });
    }

    log::info!(
        "🧩 切分完成 - {} 行 x {} 列，分块 {}x{}，共 {} 块",
        layout.rows,
        layout.columns,
        layout.piece_width,
        layout.piece_height,
        pieces.len()
    );

    Ok(TileGrid { layout, pieces })
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgba, RgbaImage};

    fn gradient(width: u32, height: u32) -> DecodedBitmap {
        DecodedBitmap::from_rgba(RgbaImage::from_fn(width, height, |x, y| {
            Rgba([x as u8, y as u8, (x ^ y) as u8, 255])
        }))
    }

    #[test]
    fn example_grid_100_by_100_into_2_by_3() {
        let grid = compute_tiles(&gradient(100, 100), &TileSpec::grid(2, 3), DegeneratePolicy::Fail)
            .expect("tile");

        assert_eq!(grid.len(), 6);
        let offsets: Vec<(u32, u32)> = grid.iter().map(|p| (p.rect().x, p.rect().y)).collect();
        assert_eq!(
            offsets,
            vec![(0, 0), (33, 0), (66, 0), (0, 50), (33, 50), (66, 50)]
        );
        assert!(grid.iter().all(|p| p.rect().width == 33 && p.rect().height == 50));
        assert_eq!(grid.get(1, 2).map(|p| p.index()), Some(5));
        assert_eq!(grid.get(2, 0), None);
    }

    #[test]
    fn tile_size_overrides_counts() {
        let layout = resolve_layout(100, 45, &TileSpec::tile_size(30, 20), DegeneratePolicy::Fail)
            .expect("layout");
        assert_eq!((layout.columns, layout.rows), (4, 3));
        assert_eq!((layout.piece_width, layout.piece_height), (25, 15));

        let mixed = TileSpec {
            rows: 5,
            columns: 7,
            tile_width_px: Some(50),
            tile_height_px: None,
        };
        let layout = resolve_layout(100, 45, &mixed, DegeneratePolicy::Fail).expect("layout");
        assert_eq!((layout.columns, layout.rows), (2, 5));
    }

    #[test]
    fn zero_counts_and_zero_tile_size_fall_back_to_one() {
        let spec = TileSpec {
            rows: 0,
            columns: 0,
            tile_width_px: Some(0),
            tile_height_px: Some(0),
        };
        let layout = resolve_layout(10, 10, &spec, DegeneratePolicy::Fail).expect("layout");
        assert_eq!((layout.rows, layout.columns), (1, 1));
        assert_eq!((layout.piece_width, layout.piece_height), (10, 10));
    }

    #[test]
    fn single_piece_is_whole_image() {
        let bitmap = gradient(7, 5);
        let grid = compute_tiles(&bitmap, &TileSpec::default(), DegeneratePolicy::Fail).expect("tile");

        assert_eq!(grid.len(), 1);
        let piece = &grid.pieces()[0];
        let decoded = image::load_from_memory(piece.png_bytes()).expect("decode piece").to_rgba8();
        assert_eq!(&decoded, bitmap.pixels());
    }

    #[test]
    fn too_many_columns_is_degenerate_by_default() {
        let result = compute_tiles(&gradient(4, 4), &TileSpec::grid(1, 5), DegeneratePolicy::Fail);
        assert!(matches!(result, Err(SplitError::DegenerateTile(_))));
    }

    #[test]
    fn clamp_policy_limits_counts_to_pixels() {
        let layout =
            resolve_layout(4, 3, &TileSpec::grid(10, 10), DegeneratePolicy::Clamp).expect("layout");
        assert_eq!((layout.rows, layout.columns), (3, 4));
        assert_eq!((layout.piece_width, layout.piece_height), (1, 1));
    }

    #[test]
    fn piece_limit_is_enforced() {
        let result = compute_tiles_limited(
            &gradient(10, 10),
            &TileSpec::grid(5, 5),
            DegeneratePolicy::Fail,
            24,
        );
        assert!(matches!(result, Err(SplitError::ResourceLimit(_))));
    }

    #[test]
    fn default_entry_caps_piece_count() {
        let result = compute_tiles(
            &gradient(200, 100),
            &TileSpec::tile_size(1, 1),
            DegeneratePolicy::Fail,
        );
        assert!(matches!(result, Err(SplitError::ResourceLimit(_))));
    }

    #[test]
    fn pieces_copy_exact_pixels_and_drop_remainder() {
        let bitmap = gradient(11, 7);
        let grid = compute_tiles(&bitmap, &TileSpec::grid(2, 3), DegeneratePolicy::Fail).expect("tile");

        for piece in &grid {
            let rect = piece.rect();
            let decoded = image::load_from_memory(piece.png_bytes()).expect("decode").to_rgba8();
            assert_eq!(decoded.dimensions(), (3, 3));
            for (x, y, pixel) in decoded.enumerate_pixels() {
                assert_eq!(pixel, bitmap.pixels().get_pixel(rect.x + x, rect.y + y));
            }
        }
        assert_eq!(grid.layout().covered_extent(), (9, 6));
    }
}
