use crate::options::ExtrapolationMethodOption;

/// Extrapolate the value at `x` from the `points` (given as `(x, y)` pairs,
/// sorted by increasing `x`), using the given `method`.
///
/// Returns `None` if there are not enough points for the method, or if the
/// extrapolation is not a finite number.
pub fn extrapolate(method: ExtrapolationMethodOption, points: &[(f64, f64)], x: f64) -> Option<f64> {
    let value = match method {
        ExtrapolationMethodOption::LinePrediction => line_prediction(points, x)?,
        ExtrapolationMethodOption::LinearRegression => linear_regression(points, x)?,
        ExtrapolationMethodOption::Lagrange => lagrange(points, x)?,
        ExtrapolationMethodOption::Newton => newton(points, x)?,
    };

    if value.is_finite() {
        Some(value)
    } else {
        None
    }
}

/// Line through the last two points
fn line_prediction(points: &[(f64, f64)], x: f64) -> Option<f64> {
    let [.., (x1, y1), (x2, y2)] = points else {
        return None;
    };

    if x1 == x2 {
        return Some(*y2);
    }

    let slope = (y2 - y1) / (x2 - x1);
    return Some(y2 + slope * (x - x2));
}

/// Least-squares line through all points
fn linear_regression(points: &[(f64, f64)], x: f64) -> Option<f64> {
    if points.len() < 2 {
        return None;
    }

    let n = points.len() as f64;
    let mean_x = points.iter().map(|p| p.0).sum::<f64>() / n;
    let mean_y = points.iter().map(|p| p.1).sum::<f64>() / n;

    let mut covariance = 0.0;
    let mut variance = 0.0;
    for &(xi, yi) in points {
        covariance += (xi - mean_x) * (yi - mean_y);
        variance += (xi - mean_x) * (xi - mean_x);
    }

    if variance == 0.0 {
        return Some(mean_y);
    }

    let slope = covariance / variance;
    return Some(mean_y + slope * (x - mean_x));
}

/// Polynomial going through all points, evaluated with the Lagrange form
fn lagrange(points: &[(f64, f64)], x: f64) -> Option<f64> {
    if points.len() < 2 {
        return None;
    }

    let mut result = 0.0;
    for (i, &(xi, yi)) in points.iter().enumerate() {
        let mut basis = 1.0;
        for (j, &(xj, _)) in points.iter().enumerate() {
            if i != j {
                basis *= (x - xj) / (xi - xj);
            }
        }
        result += yi * basis;
    }
    return Some(result);
}

/// Polynomial going through all points, evaluated with Newton's divided
/// differences
fn newton(points: &[(f64, f64)], x: f64) -> Option<f64> {
    if points.len() < 2 {
        return None;
    }

    let n = points.len();
    let mut coefficients = points.iter().map(|p| p.1).collect::<Vec<_>>();
    for level in 1..n {
        for i in (level..n).rev() {
            let dx = points[i].0 - points[i - level].0;
            coefficients[i] = (coefficients[i] - coefficients[i - 1]) / dx;
        }
    }

    let mut result = coefficients[n - 1];
    for i in (0..n - 1).rev() {
        result = result * (x - points[i].0) + coefficients[i];
    }
    return Some(result);
}

#[cfg(test)]
mod tests {
    use approx::assert_relative_eq;

    use super::*;

    const ALL: [ExtrapolationMethodOption; 4] = [
        ExtrapolationMethodOption::LinePrediction,
        ExtrapolationMethodOption::LinearRegression,
        ExtrapolationMethodOption::Lagrange,
        ExtrapolationMethodOption::Newton,
    ];

    #[test]
    fn linear_data() {
        // all methods are exact for points on a line
        let points = [(0.0, 100.0), (10.0, 120.0), (20.0, 140.0)];
        for method in ALL {
            assert_relative_eq!(extrapolate(method, &points, 30.0).unwrap(), 160.0, max_relative = 1e-12);
        }
    }

    #[test]
    fn quadratic_data() {
        let points = [(0.0, 0.0), (1.0, 1.0), (2.0, 4.0)];
        assert_relative_eq!(extrapolate(ExtrapolationMethodOption::Lagrange, &points, 3.0).unwrap(), 9.0, max_relative = 1e-12);
        assert_relative_eq!(extrapolate(ExtrapolationMethodOption::Newton, &points, 3.0).unwrap(), 9.0, max_relative = 1e-12);
        assert_relative_eq!(extrapolate(ExtrapolationMethodOption::LinePrediction, &points, 3.0).unwrap(), 7.0);
        assert_relative_eq!(extrapolate(ExtrapolationMethodOption::LinearRegression, &points, 3.0).unwrap(), 17.0 / 3.0, max_relative = 1e-12);
    }

    #[test]
    fn not_enough_points() {
        for method in ALL {
            assert_eq!(extrapolate(method, &[(0.0, 1.0)], 1.0), None);
            assert_eq!(extrapolate(method, &[], 1.0), None);
        }

        // duplicated x values make the polynomial undefined
        assert_eq!(extrapolate(ExtrapolationMethodOption::Lagrange, &[(1.0, 1.0), (1.0, 2.0)], 2.0), None);
    }
}
