//! Summary statistics for profiles and Monte-Carlo ensembles

/// Arithmetic mean, or `None` for an empty slice.
pub fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    Some(values.iter().sum::<f64>() / values.len() as f64)
}

/// Population standard deviation (divides by `n`), or `None` for an empty slice.
pub fn std_dev(values: &[f64]) -> Option<f64> {
    let mu = mean(values)?;
    let variance = values.iter().map(|v| (v - mu).powi(2)).sum::<f64>() / values.len() as f64;
    Some(variance.sqrt())
}

/// Mean and standard error of the mean (`std / sqrt(n)`).
///
/// A single sample has standard error exactly 0. Returns `None` when the
/// slice is empty.
pub fn mean_and_standard_error(values: &[f64]) -> Option<(f64, f64)> {
    let mu = mean(values)?;
    if values.len() == 1 {
        return Some((mu, 0.0));
    }
    let sigma = std_dev(values)?;
    Some((mu, sigma / (values.len() as f64).sqrt()))
}

/// Column-wise mean and population standard deviation of equal-length rows.
///
/// # Returns
/// * `Ok((means, stds))` - One entry per column
/// * `Err(message)` - If there are no rows or the rows differ in length
pub fn column_mean_and_std(rows: &[Vec<f64>]) -> Result<(Vec<f64>, Vec<f64>), String> {
    let width = match rows.first() {
        Some(first) => first.len(),
        None => return Err("Cannot compute column statistics of zero rows".to_string()),
    };

    if let Some((i, row)) = rows.iter().enumerate().find(|(_, r)| r.len() != width) {
        return Err(format!(
            "Row {} has length {} but row 0 has length {}",
            i,
            row.len(),
            width
        ));
    }

    let n = rows.len() as f64;
    let mut means = vec![0.0; width];
    for row in rows {
        for (m, v) in means.iter_mut().zip(row) {
            *m += v;
        }
    }
    means.iter_mut().for_each(|m| *m /= n);

    let mut stds = vec![0.0; width];
    for row in rows {
        for ((s, v), m) in stds.iter_mut().zip(row).zip(&means) {
            *s += (v - m).powi(2);
        }
    }
    stds.iter_mut().for_each(|s| *s = (*s / n).sqrt());

    Ok((means, stds))
}
